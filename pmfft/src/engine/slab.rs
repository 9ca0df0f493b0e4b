//! Slab decomposed transform.
use std::time::Instant;

use log::{info, trace};

use crate::{
    decomposition::{GridSpec, Layout, SlabPlan},
    engine::types::{SlabFft, SlabPlans, Transition},
    fft::{C2cPlan, C2rPlan, R2cPlan, Sign},
    helpers::fft_buffer,
    traits::{fft::DistributedFft, general::PmScalar, parallel::Communicator, types::PmError},
};

impl<T> DistributedFft<T> for SlabFft<T>
where
    T: PmScalar,
{
    const STRATEGY: &'static str = "slab";

    fn new<C: Communicator>(grid: GridSpec, comm: &C) -> Result<Self, PmError> {
        let plan = SlabPlan::new(grid, comm.size())?;
        let rank = comm.rank();

        let z_rows = plan.x_slabs_real.local_columns(rank).len();
        let x_rows = plan.y_slabs.local_columns(rank).len();

        // Transforms along y act on one x-slab at a time, interleaved over z
        let plans = SlabPlans {
            r2c_z: R2cPlan::new(grid.nz, z_rows)?,
            c2r_z: C2rPlan::new(grid.nz, z_rows)?,
            forward_y: C2cPlan::new(Sign::Forward, grid.ny, grid.nzc, grid.nzc, 1)?,
            backward_y: C2cPlan::new(Sign::Backward, grid.ny, grid.nzc, grid.nzc, 1)?,
            forward_x: C2cPlan::new(Sign::Forward, grid.nx, x_rows, 1, grid.nx)?,
            backward_x: C2cPlan::new(Sign::Backward, grid.nx, x_rows, 1, grid.nx)?,
        };

        let transpose = Transition::new(&plan.x_slabs, &plan.y_slabs, comm)?;

        info!(
            "rank {} slab transform: x-slabs {:?}, y-slabs {:?}",
            rank, plan.x_slabs.ranges[rank], plan.y_slabs.ranges[rank]
        );

        Ok(Self {
            plan,
            rank,
            plans,
            transpose,
        })
    }

    fn grid(&self) -> &GridSpec {
        &self.plan.grid
    }

    fn fftsize(&self) -> usize {
        self.plan.fftsize
    }

    fn real_layout(&self) -> &Layout {
        &self.plan.x_slabs_real
    }

    fn complex_layout(&self) -> &Layout {
        &self.plan.y_slabs
    }

    fn forward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError> {
        let data = fft_buffer(data, self.plan.fftsize)?;
        let real_len = self.plan.x_slabs_real.local_len(self.rank);
        let slab_len = self.plan.grid.ny * self.plan.grid.nzc;

        let timer = Instant::now();
        self.plans.r2c_z.execute(&mut data[..real_len])?;

        let spectrum = T::as_complex_mut(data);
        for slab in spectrum[..real_len / 2].chunks_exact_mut(slab_len) {
            self.plans.forward_y.execute(slab)?;
        }
        trace!("rank {} slab forward z, y: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        self.transpose.forward(comm, spectrum)?;
        trace!("rank {} slab forward transpose: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        let spectrum_len = self.plan.y_slabs.local_len(self.rank);
        self.plans.forward_x.execute(&mut spectrum[..spectrum_len])?;
        trace!("rank {} slab forward x: {:?}", self.rank, timer.elapsed());

        Ok(())
    }

    fn backward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError> {
        let data = fft_buffer(data, self.plan.fftsize)?;
        let real_len = self.plan.x_slabs_real.local_len(self.rank);
        let slab_len = self.plan.grid.ny * self.plan.grid.nzc;

        let timer = Instant::now();
        let spectrum = T::as_complex_mut(data);
        let spectrum_len = self.plan.y_slabs.local_len(self.rank);
        self.plans.backward_x.execute(&mut spectrum[..spectrum_len])?;
        trace!("rank {} slab backward x: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        self.transpose.backward(comm, spectrum)?;
        trace!("rank {} slab backward transpose: {:?}", self.rank, timer.elapsed());

        let timer = Instant::now();
        for slab in spectrum[..real_len / 2].chunks_exact_mut(slab_len) {
            self.plans.backward_y.execute(slab)?;
        }
        self.plans.c2r_z.execute(&mut data[..real_len])?;

        let scale = T::one() / T::cast(self.plan.grid.volume() as f64);
        data[..real_len].iter_mut().for_each(|v| *v = *v * scale);
        trace!("rank {} slab backward y, z: {:?}", self.rank, timer.elapsed());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use num_complex::Complex;

    use super::*;
    use crate::{comm::LocalCommunicator, helpers::field_fixture};

    fn pseudo_random(cell: [usize; 3]) -> f64 {
        let h = (cell[0] * 73856093) ^ (cell[1] * 19349663) ^ (cell[2] * 83492791);
        (h % 1000) as f64 / 1000.0 - 0.5
    }

    fn round_trip<T: PmScalar>(grid: GridSpec, n_procs: usize) {
        LocalCommunicator::run(n_procs, |comm| {
            let fft = SlabFft::<T>::new(grid, comm).unwrap();
            let layout = fft.real_layout().clone();
            let fftsize = fft.fftsize();
            let mut data = field_fixture::<T>(&layout, comm.rank(), fftsize, pseudo_random);
            let expected = data.clone();

            fft.forward(comm, &mut data).unwrap();
            fft.backward(comm, &mut data).unwrap();

            for column in layout.local_columns(comm.rank()) {
                for z in 0..grid.nz {
                    let cell = layout.cell_of(column, z);
                    let offset = layout.local_offset(comm.rank(), cell);
                    let error = (data[offset] - expected[offset]).widen().abs();
                    assert!(error < T::round_trip_tolerance(), "error {} at {:?}", error, cell);
                }
            }
        });
    }

    #[test]
    fn test_round_trip_f64() {
        for n_procs in 1..=4 {
            round_trip::<f64>(GridSpec::new(8, 6, 10).unwrap(), n_procs);
            round_trip::<f64>(GridSpec::new(5, 7, 9).unwrap(), n_procs);
        }
    }

    #[test]
    fn test_round_trip_f32() {
        for n_procs in 1..=4 {
            round_trip::<f32>(GridSpec::new(8, 6, 10).unwrap(), n_procs);
            round_trip::<f32>(GridSpec::new(5, 7, 9).unwrap(), n_procs);
        }
    }

    #[test]
    fn test_spectrum_matches_direct_dft() {
        let grid = GridSpec::new(4, 3, 5).unwrap();

        for n_procs in 1..=3 {
            LocalCommunicator::run(n_procs, |comm| {
                let rank = comm.rank();
                let fft = SlabFft::<f64>::new(grid, comm).unwrap();
                let fftsize = fft.fftsize();
                let mut data =
                    field_fixture::<f64>(fft.real_layout(), rank, fftsize, pseudo_random);
                fft.forward(comm, &mut data).unwrap();

                let spectrum = f64::as_complex(&data);
                let layout = fft.complex_layout();
                for column in layout.local_columns(rank) {
                    for position in 0..layout.dims[2] {
                        let mode = layout.cell_of(column, position);
                        let mut expected = Complex::new(0.0, 0.0);
                        for x in 0..4 {
                            for y in 0..3 {
                                for z in 0..5 {
                                    let phase = -2.0
                                        * std::f64::consts::PI
                                        * ((mode[0] * x) as f64 / 4.0
                                            + (mode[1] * y) as f64 / 3.0
                                            + (mode[2] * z) as f64 / 5.0);
                                    expected += Complex::new(phase.cos(), phase.sin())
                                        * pseudo_random([x, y, z]);
                                }
                            }
                        }
                        let value = spectrum[layout.local_offset(rank, mode)];
                        assert_relative_eq!(value.re, expected.re, epsilon = 1e-10);
                        assert_relative_eq!(value.im, expected.im, epsilon = 1e-10);
                    }
                }
            });
        }
    }

    #[test]
    fn test_64_cubed_on_four_processes() {
        let grid = GridSpec::new(64, 64, 64).unwrap();
        let results = LocalCommunicator::run(4, |comm| {
            let rank = comm.rank();
            let fft = SlabFft::<f64>::new(grid, comm).unwrap();
            assert_eq!(fft.plan.x_slabs.ranges[rank].count, 16);
            assert_eq!(fft.plan.y_slabs.ranges[rank].count, 16);

            let fftsize = fft.fftsize();
            let layout = fft.real_layout().clone();
            let mut data = field_fixture::<f64>(&layout, rank, fftsize, |cell| {
                grid.flat_index(cell) as f64
            });
            let expected = data.clone();

            fft.forward(comm, &mut data).unwrap();
            let dc = f64::as_complex(&data)[0];

            fft.backward(comm, &mut data).unwrap();
            let max_error = layout
                .local_columns(rank)
                .flat_map(|column| (0..64).map(move |z| (column, z)))
                .map(|(column, z)| {
                    let offset = layout.local_offset(rank, layout.cell_of(column, z));
                    (data[offset] - expected[offset]).abs()
                })
                .fold(0.0, f64::max);

            (dc, max_error)
        });

        // Rank 0 owns the y = 0 slab, so the first mode it stores is k = 0
        let n = 64.0 * 64.0 * 64.0;
        assert_relative_eq!(results[0].0.re, n * (n - 1.0) / 2.0, max_relative = 1e-12);
        assert!(results.iter().all(|r| r.1 < 1e-5));
    }

    #[test]
    fn test_too_many_processes() {
        let grid = GridSpec::new(3, 8, 8).unwrap();
        let results = LocalCommunicator::run(4, |comm| {
            SlabFft::<f32>::new(grid, comm).err()
        });
        assert!(results
            .iter()
            .all(|r| matches!(r, Some(PmError::Configuration(_)))));
    }
}
