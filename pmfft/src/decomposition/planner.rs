//! Ownership ranges for the slab and column strategies.
use itertools::Itertools;
use log::info;

use crate::{
    decomposition::types::{GridSpec, Layout, ProcessRange},
    traits::types::PmError,
};

/// Split `n` units over `n_procs` processes.
///
/// Every process receives `n / n_procs` units, the first `n % n_procs` processes receive one
/// extra unit, so that counts differ by at most one and the ranges tile `0..n` in rank order.
///
/// # Arguments
/// * `n` - Number of units along the partitioned axis.
/// * `n_procs` - Number of processes.
pub fn balanced_ranges(n: usize, n_procs: usize) -> Vec<ProcessRange> {
    let base = n / n_procs;
    let remainder = n % n_procs;

    (0..n_procs)
        .scan(0, |first, rank| {
            let count = base + usize::from(rank < remainder);
            let range = ProcessRange {
                first: *first,
                count,
            };
            *first += count;
            Some(range)
        })
        .collect_vec()
}

/// Layouts visited by the slab based transform.
#[derive(Clone, Debug)]
pub struct SlabPlan {
    /// Transform grid.
    pub grid: GridSpec,

    /// Real input, x-slabs stored `[x][y][z]` with padded rows.
    pub x_slabs_real: Layout,

    /// Complex view of the real input after the z transform, `[x][y][z]`.
    pub x_slabs: Layout,

    /// Transposed spectrum, y-slabs stored `[y][z][x]`.
    pub y_slabs: Layout,

    /// Length (in real values) of the buffer every process allocates.
    pub fftsize: usize,
}

impl SlabPlan {
    /// Plan a slab decomposition.
    ///
    /// # Arguments
    /// * `grid` - Transform grid.
    /// * `n_procs` - Number of processes, at most the number of cells along x and y.
    pub fn new(grid: GridSpec, n_procs: usize) -> Result<Self, PmError> {
        let x_slabs_real = Layout::slabs(grid.shape(), [0, 1, 2], grid.nz2, n_procs)?;
        let x_slabs = Layout::slabs(grid.complex_shape(), [0, 1, 2], grid.nzc, n_procs)?;
        let y_slabs = Layout::slabs(grid.complex_shape(), [1, 2, 0], grid.nx, n_procs)?;

        let fftsize = x_slabs_real
            .max_local_len()
            .max(2 * x_slabs.max_local_len())
            .max(2 * y_slabs.max_local_len());

        info!(
            "slab plan {}x{}x{} on {} processes: largest x-slab {}, largest y-slab {}, fftsize {}",
            grid.nx,
            grid.ny,
            grid.nz,
            n_procs,
            x_slabs.ranges.iter().map(|r| r.count).max().unwrap_or(0),
            y_slabs.ranges.iter().map(|r| r.count).max().unwrap_or(0),
            fftsize
        );

        Ok(Self {
            grid,
            x_slabs_real,
            x_slabs,
            y_slabs,
            fftsize,
        })
    }
}

/// Layouts visited by the column (pencil) based transform.
#[derive(Clone, Debug)]
pub struct ColumnPlan {
    /// Transform grid.
    pub grid: GridSpec,

    /// Real input, XY columns stored `[x][y][z]` with padded rows.
    pub xy_real: Layout,

    /// Complex view of the real input after the z transform.
    pub xy: Layout,

    /// First transposed layout, columns over (x, z) stored `[x][z][y]`.
    pub transposed: Layout,

    /// Second transposed layout, columns over (y, z) stored `[y][z][x]`.
    pub second_transposed: Layout,

    /// Length (in real values) of the buffer every process allocates.
    pub fftsize: usize,
}

impl ColumnPlan {
    /// Plan a column decomposition.
    ///
    /// # Arguments
    /// * `grid` - Transform grid.
    /// * `n_procs` - Number of processes, at most the number of columns of every layout.
    pub fn new(grid: GridSpec, n_procs: usize) -> Result<Self, PmError> {
        let xy_real = Layout::columns(grid.shape(), [0, 1, 2], grid.nz2, n_procs)?;
        let xy = Layout::columns(grid.complex_shape(), [0, 1, 2], grid.nzc, n_procs)?;
        let transposed = Layout::columns(grid.complex_shape(), [0, 2, 1], grid.ny, n_procs)?;
        let second_transposed =
            Layout::columns(grid.complex_shape(), [1, 2, 0], grid.nx, n_procs)?;

        let fftsize = xy_real
            .max_local_len()
            .max(2 * xy.max_local_len())
            .max(2 * transposed.max_local_len())
            .max(2 * second_transposed.max_local_len());

        info!(
            "column plan {}x{}x{} on {} processes: columns XY {}, transposed {}, second transposed {}, fftsize {}",
            grid.nx,
            grid.ny,
            grid.nz,
            n_procs,
            xy.n_columns(),
            transposed.n_columns(),
            second_transposed.n_columns(),
            fftsize
        );

        Ok(Self {
            grid,
            xy_real,
            xy,
            transposed,
            second_transposed,
            fftsize,
        })
    }
}
