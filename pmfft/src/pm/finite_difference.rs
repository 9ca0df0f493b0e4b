//! Four point finite difference gradients of a distributed potential.
use log::debug;
use rayon::prelude::*;

use crate::{
    decomposition::Layout,
    engine::Transition,
    helpers::try_zeroed,
    pm::types::FiniteDifference,
    traits::{general::PmScalar, parallel::Communicator, types::PmError},
};

/// Minus the derivative along the contiguous axis of every local row.
///
/// Uses `(2/3 (f[i+1] - f[i-1]) - 1/12 (f[i+2] - f[i-2])) / h` with periodic wrapping.
///
/// # Arguments
/// * `input` - Local rows of a layout.
/// * `output` - Destination, in the same layout.
/// * `layout` - Layout of both buffers.
/// * `rank` - Rank of the calling process.
/// * `cell_size` - Grid spacing.
pub fn negative_derivative<T: PmScalar>(
    input: &[T],
    output: &mut [T],
    layout: &Layout,
    rank: usize,
    cell_size: f64,
) {
    let n = layout.dims[2];
    let stride = layout.row_stride;
    let len = layout.local_len(rank);
    let scale = -1.0 / cell_size;

    output[..len]
        .par_chunks_exact_mut(stride)
        .zip(input[..len].par_chunks_exact(stride))
        .for_each(|(out, row)| {
            for i in 0..n {
                let at = |shift: usize| row[(i + shift) % n].widen();
                let d1 = at(1) - at(n - 1);
                let d2 = at(2) - at(2 * n - 2);
                out[i] = T::cast(scale * (2.0 / 3.0 * d1 - d2 / 12.0));
            }
        });
}

impl FiniteDifference {
    /// Plan the remaps between the real layout and layouts with y or x local. Collective.
    ///
    /// # Arguments
    /// * `real` - Real layout of the potential, z local.
    /// * `comm` - Communicator.
    pub fn new<C: Communicator>(real: &Layout, comm: &C) -> Result<Self, PmError> {
        let shape = real.shape();
        let n_procs = comm.size();

        let xz = Layout::columns(shape, [0, 2, 1], shape[1], n_procs)?;
        let zy = Layout::columns(shape, [2, 1, 0], shape[0], n_procs)?;

        let result = Self {
            xz: Transition::new(real, &xz, comm)?,
            zy: Transition::new(real, &zy, comm)?,
            rank: comm.rank(),
        };

        debug!(
            "rank {} finite difference remaps: y {}, x {}",
            result.rank,
            if result.xz.is_local() { "local" } else { "remap" },
            if result.zy.is_local() { "local" } else { "remap" }
        );

        Ok(result)
    }

    /// Length of the buffers the gradient works on.
    pub fn buffer_len(&self) -> usize {
        [&self.xz.source, &self.xz.dest, &self.zy.dest]
            .iter()
            .map(|layout| layout.local_len(self.rank))
            .max()
            .unwrap_or(0)
    }

    /// Minus the gradient of a potential, each component in the real layout. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator.
    /// * `potential` - Local potential in the real layout.
    /// * `cell_size` - Grid spacing.
    pub fn gradient<T: PmScalar, C: Communicator>(
        &self,
        comm: &C,
        potential: &[T],
        cell_size: f64,
    ) -> Result<[Vec<T>; 3], PmError> {
        let real = &self.xz.source;
        let real_len = real.local_len(self.rank);
        if potential.len() < real_len {
            return Err(PmError::InvalidInput(format!(
                "potential of {} values is shorter than the local layout",
                potential.len()
            )));
        }

        let len = self.buffer_len();

        let mut gz = try_zeroed::<T>(len)?;
        negative_derivative(potential, &mut gz, real, self.rank, cell_size);

        let gy = self.along(comm, &self.xz, potential, cell_size)?;
        let gx = self.along(comm, &self.zy, potential, cell_size)?;

        Ok([gx, gy, gz])
    }

    fn along<T: PmScalar, C: Communicator>(
        &self,
        comm: &C,
        transition: &Transition,
        potential: &[T],
        cell_size: f64,
    ) -> Result<Vec<T>, PmError> {
        let len = self.buffer_len();
        let real_len = transition.source.local_len(self.rank);

        let mut phi = try_zeroed::<T>(len)?;
        phi[..real_len].copy_from_slice(&potential[..real_len]);
        transition.forward(comm, &mut phi)?;

        let mut gradient = try_zeroed::<T>(len)?;
        negative_derivative(&phi, &mut gradient, &transition.dest, self.rank, cell_size);
        transition.backward(comm, &mut gradient)?;

        Ok(gradient)
    }
}

#[cfg(test)]
mod test {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        comm::LocalCommunicator,
        decomposition::{GridSpec, SlabPlan},
    };

    #[test]
    fn test_derivative_of_sine() {
        let n = 32;
        let layout = Layout::columns([1, 1, n], [0, 1, 2], n + 2, 1).unwrap();
        let h = 1.0 / n as f64;
        let input = (0..n + 2)
            .map(|i| (2.0 * PI * (i % n) as f64 * h).sin())
            .collect::<Vec<f64>>();
        let mut output = vec![0f64; n + 2];
        negative_derivative(&input, &mut output, &layout, 0, h);

        for i in 0..n {
            let expected = -2.0 * PI * (2.0 * PI * i as f64 * h).cos();
            assert_relative_eq!(output[i], expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_gradient_of_distributed_plane_waves() {
        let grid = GridSpec::new(16, 16, 20).unwrap();
        let shape = grid.shape();
        let h = 0.0625;

        for n_procs in 1..=3 {
            let results = LocalCommunicator::run(n_procs, |comm| {
                let rank = comm.rank();
                let plan = SlabPlan::new(grid, comm.size()).unwrap();
                let real = &plan.x_slabs_real;
                let fd = FiniteDifference::new(real, comm).unwrap();

                let phase = |cell: [usize; 3]| {
                    (0..3)
                        .map(|a| 2.0 * PI * cell[a] as f64 / shape[a] as f64)
                        .sum::<f64>()
                };

                let mut potential = vec![0f64; real.local_len(rank)];
                for (offset, cell) in real.local_cells(rank) {
                    potential[offset] = phase(cell).sin();
                }

                let gradient = fd.gradient(comm, &potential, h).unwrap();

                let mut max_error = 0f64;
                for (offset, cell) in real.local_cells(rank) {
                    for a in 0..3 {
                        let k = 2.0 * PI / (shape[a] as f64 * h);
                        let expected = -k * phase(cell).cos();
                        max_error = max_error.max((gradient[a][offset] - expected).abs() / k);
                    }
                }
                max_error
            });

            for error in results {
                // Fourth order truncation at 16 points per wavelength
                assert!(error < 2e-3, "error {}", error);
            }
        }
    }
}
