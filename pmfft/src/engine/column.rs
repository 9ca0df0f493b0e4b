//! Column (pencil) decomposed transform.
use std::time::Instant;

use log::{info, trace};

use crate::{
    decomposition::{ColumnPlan, GridSpec, Layout},
    engine::types::{ColumnFft, ColumnPlans, Transition},
    fft::{C2cPlan, C2rPlan, R2cPlan, Sign},
    helpers::fft_buffer,
    traits::{fft::DistributedFft, general::PmScalar, parallel::Communicator, types::PmError},
};

impl<T> DistributedFft<T> for ColumnFft<T>
where
    T: PmScalar,
{
    const STRATEGY: &'static str = "column";

    fn new<C: Communicator>(grid: GridSpec, comm: &C) -> Result<Self, PmError> {
        let plan = ColumnPlan::new(grid, comm.size())?;
        let rank = comm.rank();

        let z_rows = plan.xy_real.local_columns(rank).len();
        let y_rows = plan.transposed.local_columns(rank).len();
        let x_rows = plan.second_transposed.local_columns(rank).len();

        let plans = ColumnPlans {
            r2c_z: R2cPlan::new(grid.nz, z_rows)?,
            c2r_z: C2rPlan::new(grid.nz, z_rows)?,
            forward_y: C2cPlan::new(Sign::Forward, grid.ny, y_rows, 1, grid.ny)?,
            backward_y: C2cPlan::new(Sign::Backward, grid.ny, y_rows, 1, grid.ny)?,
            forward_x: C2cPlan::new(Sign::Forward, grid.nx, x_rows, 1, grid.nx)?,
            backward_x: C2cPlan::new(Sign::Backward, grid.nx, x_rows, 1, grid.nx)?,
        };

        let first = Transition::new(&plan.xy, &plan.transposed, comm)?;
        let second = Transition::new(&plan.transposed, &plan.second_transposed, comm)?;

        info!(
            "rank {} column transform: {} XY columns, {} XZ columns, {} YZ columns, local transitions {}/{}",
            rank,
            z_rows,
            y_rows,
            x_rows,
            first.is_local(),
            second.is_local()
        );

        Ok(Self {
            plan,
            rank,
            plans,
            first,
            second,
        })
    }

    fn grid(&self) -> &GridSpec {
        &self.plan.grid
    }

    fn fftsize(&self) -> usize {
        self.plan.fftsize
    }

    fn real_layout(&self) -> &Layout {
        &self.plan.xy_real
    }

    fn complex_layout(&self) -> &Layout {
        &self.plan.second_transposed
    }

    fn forward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError> {
        let data = fft_buffer(data, self.plan.fftsize)?;
        let real_len = self.plan.xy_real.local_len(self.rank);

        let timer = Instant::now();
        self.plans.r2c_z.execute(&mut data[..real_len])?;
        trace!("rank {} column forward z: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        let spectrum = T::as_complex_mut(data);
        self.first.forward(comm, spectrum)?;
        let len = self.plan.transposed.local_len(self.rank);
        self.plans.forward_y.execute(&mut spectrum[..len])?;
        trace!("rank {} column forward y: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        self.second.forward(comm, spectrum)?;
        let len = self.plan.second_transposed.local_len(self.rank);
        self.plans.forward_x.execute(&mut spectrum[..len])?;
        trace!("rank {} column forward x: {:?}", self.rank, timer.elapsed());

        Ok(())
    }

    fn backward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError> {
        let data = fft_buffer(data, self.plan.fftsize)?;
        let real_len = self.plan.xy_real.local_len(self.rank);

        let timer = Instant::now();
        let spectrum = T::as_complex_mut(data);
        let len = self.plan.second_transposed.local_len(self.rank);
        self.plans.backward_x.execute(&mut spectrum[..len])?;
        self.second.backward(comm, spectrum)?;
        trace!("rank {} column backward x: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        let len = self.plan.transposed.local_len(self.rank);
        self.plans.backward_y.execute(&mut spectrum[..len])?;
        self.first.backward(comm, spectrum)?;
        trace!("rank {} column backward y: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        self.plans.c2r_z.execute(&mut data[..real_len])?;
        let scale = T::one() / T::cast(self.plan.grid.volume() as f64);
        data[..real_len].iter_mut().for_each(|v| *v = *v * scale);
        trace!("rank {} column backward z: {:?}", self.rank, timer.elapsed());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{comm::LocalCommunicator, engine::SlabFft, helpers::field_fixture};

    fn smooth_field(cell: [usize; 3]) -> f64 {
        ((cell[0] + 1) as f64).sin() * ((2 * cell[1]) as f64).cos() + 0.1 * cell[2] as f64
    }

    fn round_trip<T: PmScalar>(grid: GridSpec, n_procs: usize) {
        LocalCommunicator::run(n_procs, |comm| {
            let rank = comm.rank();
            let fft = ColumnFft::<T>::new(grid, comm).unwrap();
            let layout = fft.real_layout().clone();
            let mut data = field_fixture::<T>(&layout, rank, fft.fftsize(), smooth_field);
            let expected = data.clone();

            fft.forward(comm, &mut data).unwrap();
            fft.backward(comm, &mut data).unwrap();

            for column in layout.local_columns(rank) {
                for z in 0..grid.nz {
                    let offset = layout.local_offset(rank, layout.cell_of(column, z));
                    let error = (data[offset] - expected[offset]).widen().abs();
                    assert!(error < T::round_trip_tolerance());
                }
            }
        });
    }

    #[test]
    fn test_round_trip_f64() {
        for n_procs in 1..=4 {
            round_trip::<f64>(GridSpec::new(4, 6, 8).unwrap(), n_procs);
            round_trip::<f64>(GridSpec::new(3, 5, 7).unwrap(), n_procs);
        }
    }

    #[test]
    fn test_round_trip_f32() {
        for n_procs in 1..=4 {
            round_trip::<f32>(GridSpec::new(4, 6, 8).unwrap(), n_procs);
            round_trip::<f32>(GridSpec::new(3, 5, 7).unwrap(), n_procs);
        }
    }

    #[test]
    fn test_more_processes_than_slabs() {
        // Slabs cannot split a 2 x 3 plane over 5 processes, columns can
        round_trip::<f64>(GridSpec::new(2, 3, 16).unwrap(), 5);
    }

    #[test]
    fn test_single_process_transitions_are_local() {
        let grid = GridSpec::new(4, 4, 4).unwrap();
        LocalCommunicator::run(1, |comm| {
            let fft = ColumnFft::<f64>::new(grid, comm).unwrap();
            assert!(fft.first.is_local());
            assert!(fft.second.is_local());
        });
        LocalCommunicator::run(2, |comm| {
            let fft = ColumnFft::<f64>::new(grid, comm).unwrap();
            assert!(!fft.second.is_local());
        });
    }

    #[test]
    fn test_agrees_with_slab() {
        let grid = GridSpec::new(6, 4, 6).unwrap();

        for n_procs in [2, 3] {
            LocalCommunicator::run(n_procs, |comm| {
                let rank = comm.rank();
                let column = ColumnFft::<f64>::new(grid, comm).unwrap();
                let slab = SlabFft::<f64>::new(grid, comm).unwrap();

                let mut a = field_fixture::<f64>(
                    column.real_layout(),
                    rank,
                    column.fftsize(),
                    smooth_field,
                );
                let mut b =
                    field_fixture::<f64>(slab.real_layout(), rank, slab.fftsize(), smooth_field);
                column.forward(comm, &mut a).unwrap();
                slab.forward(comm, &mut b).unwrap();

                // Compare on cells owned in both output layouts
                let (la, lb) = (column.complex_layout(), slab.complex_layout());
                let (sa, sb) = (f64::as_complex(&a), f64::as_complex(&b));
                for c in la.local_columns(rank) {
                    for x in 0..grid.nx {
                        let mode = la.cell_of(c, x);
                        if lb.owner_of_cell(mode) == rank {
                            let va = sa[la.local_offset(rank, mode)];
                            let vb = sb[lb.local_offset(rank, mode)];
                            assert_relative_eq!(va.re, vb.re, epsilon = 1e-10);
                            assert_relative_eq!(va.im, vb.im, epsilon = 1e-10);
                        }
                    }
                }
            });
        }
    }
}
