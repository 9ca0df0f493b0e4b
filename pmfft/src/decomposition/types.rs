//! Data structures describing grids and their distribution over processes.
use crate::traits::types::PmError;

/// Contiguous ownership of units (slabs or columns) by one process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessRange {
    /// First unit owned.
    pub first: usize,

    /// Number of units owned.
    pub count: usize,
}

impl ProcessRange {
    /// One past the last unit owned.
    pub fn end(&self) -> usize {
        self.first + self.count
    }
}

/// Global dimensions of a transform grid.
///
/// The last axis of the real grid is stored with padding to `nz2 = 2 * (nz / 2 + 1)` so that a
/// real-to-complex transform can run in place. The padding is part of the stored layout even when
/// it carries no data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridSpec {
    /// Cells along x.
    pub nx: usize,

    /// Cells along y.
    pub ny: usize,

    /// Cells along z.
    pub nz: usize,

    /// Complex points along z after a real-to-complex transform, `nz / 2 + 1`.
    pub nzc: usize,

    /// Stored (padded) length of a real row along z, `2 * nzc`.
    pub nz2: usize,
}

impl GridSpec {
    /// Construct a grid, checking that every axis is non empty and that the padded volume can be
    /// addressed.
    ///
    /// # Arguments
    /// * `nx`, `ny`, `nz` - Number of cells along each axis.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self, PmError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(PmError::Configuration(format!(
                "grid dimensions must be positive, got {}x{}x{}",
                nx, ny, nz
            )));
        }

        let nzc = nz / 2 + 1;
        let nz2 = 2 * nzc;

        nx.checked_mul(ny)
            .and_then(|n| n.checked_mul(nz2))
            .ok_or_else(|| {
                PmError::IndexRange(format!(
                    "grid {}x{}x{} cannot be addressed with a single index",
                    nx, ny, nz
                ))
            })?;

        Ok(Self {
            nx,
            ny,
            nz,
            nzc,
            nz2,
        })
    }

    /// Logical shape `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Shape of the Hermitian half spectrum, `[nx, ny, nzc]`.
    pub fn complex_shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nzc]
    }

    /// Number of logical cells.
    pub fn volume(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Flat index of a cell in canonical `[x][y][z]` order, without padding.
    pub fn flat_index(&self, cell: [usize; 3]) -> usize {
        (cell[0] * self.ny + cell[1]) * self.nz + cell[2]
    }

    /// Cell with a given flat index, the inverse of [`GridSpec::flat_index`].
    pub fn unflatten(&self, index: usize) -> [usize; 3] {
        [
            index / (self.ny * self.nz),
            (index / self.nz) % self.ny,
            index % self.nz,
        ]
    }
}

/// Axis aligned box of cells in canonical `[x, y, z]` coordinates, half open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Inclusive lower corner.
    pub lo: [usize; 3],

    /// Exclusive upper corner.
    pub hi: [usize; 3],
}

impl Block {
    /// Number of cells covered.
    pub fn volume(&self) -> usize {
        (0..3).map(|a| self.hi[a] - self.lo[a]).product()
    }

    /// Overlap with another block, `None` when disjoint.
    pub fn intersect(&self, other: &Block) -> Option<Block> {
        let mut lo = [0; 3];
        let mut hi = [0; 3];
        for a in 0..3 {
            lo[a] = self.lo[a].max(other.lo[a]);
            hi[a] = self.hi[a].min(other.hi[a]);
            if lo[a] >= hi[a] {
                return None;
            }
        }
        Some(Block { lo, hi })
    }
}

/// One distributed storage order of a grid.
///
/// Axis `axes[k]` of the canonical `[x, y, z]` grid is stored at position `k`, with extent
/// `dims[k]`. The first two stored axes are flattened into columns `j0 * dims[1] + j1`, each
/// column holds `dims[2]` values followed by `row_stride - dims[2]` padding values. Processes own
/// contiguous ranges of *units*, each unit being `unit` consecutive columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Global extent of each stored axis, slowest first.
    pub dims: [usize; 3],

    /// Canonical axis held at each stored position.
    pub axes: [usize; 3],

    /// Stored length of each column, at least `dims[2]`.
    pub row_stride: usize,

    /// Columns per ownership unit.
    pub unit: usize,

    /// Units owned by each process.
    pub ranges: Vec<ProcessRange>,
}
