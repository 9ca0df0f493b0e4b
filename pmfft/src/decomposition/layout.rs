//! Ownership queries and addressing for distributed layouts.
use std::ops::Range;

use itertools::Itertools;
use superslice::Ext;

use crate::{
    decomposition::{
        planner::balanced_ranges,
        types::{Block, Layout},
    },
    traits::types::PmError,
};

impl Layout {
    /// Layout where processes own whole slabs of the leading stored axis.
    ///
    /// # Arguments
    /// * `shape` - Canonical `[x, y, z]` extents of the stored grid.
    /// * `axes` - Canonical axis held at each stored position.
    /// * `row_stride` - Stored length of the contiguous axis.
    /// * `n_procs` - Number of processes.
    pub fn slabs(
        shape: [usize; 3],
        axes: [usize; 3],
        row_stride: usize,
        n_procs: usize,
    ) -> Result<Self, PmError> {
        let dims = axes.map(|a| shape[a]);
        if n_procs > dims[0] {
            return Err(PmError::Configuration(format!(
                "{} processes exceed the {} slabs along axis {}, a process would own no slab",
                n_procs, dims[0], axes[0]
            )));
        }
        Self::validate(dims, axes, row_stride)?;

        Ok(Self {
            dims,
            axes,
            row_stride,
            unit: dims[1],
            ranges: balanced_ranges(dims[0], n_procs),
        })
    }

    /// Layout where processes own contiguous ranges of single columns.
    ///
    /// # Arguments
    /// * `shape` - Canonical `[x, y, z]` extents of the stored grid.
    /// * `axes` - Canonical axis held at each stored position.
    /// * `row_stride` - Stored length of the contiguous axis.
    /// * `n_procs` - Number of processes.
    pub fn columns(
        shape: [usize; 3],
        axes: [usize; 3],
        row_stride: usize,
        n_procs: usize,
    ) -> Result<Self, PmError> {
        let dims = axes.map(|a| shape[a]);
        let n_columns = dims[0] * dims[1];
        if n_procs > n_columns {
            return Err(PmError::Configuration(format!(
                "{} processes exceed the {} columns of layout {:?}, a process would own no column",
                n_procs, n_columns, axes
            )));
        }
        Self::validate(dims, axes, row_stride)?;

        Ok(Self {
            dims,
            axes,
            row_stride,
            unit: 1,
            ranges: balanced_ranges(n_columns, n_procs),
        })
    }

    fn validate(dims: [usize; 3], axes: [usize; 3], row_stride: usize) -> Result<(), PmError> {
        if axes.iter().sorted().copied().collect_vec() != vec![0, 1, 2] {
            return Err(PmError::Configuration(format!(
                "{:?} is not a permutation of the grid axes",
                axes
            )));
        }
        if row_stride < dims[2] {
            return Err(PmError::Configuration(format!(
                "row stride {} is shorter than the contiguous extent {}",
                row_stride, dims[2]
            )));
        }
        Ok(())
    }

    /// Number of processes the layout is distributed over.
    pub fn n_procs(&self) -> usize {
        self.ranges.len()
    }

    /// Total number of columns.
    pub fn n_columns(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    /// Canonical `[x, y, z]` extents of the stored grid.
    pub fn shape(&self) -> [usize; 3] {
        let mut shape = [0; 3];
        for k in 0..3 {
            shape[self.axes[k]] = self.dims[k];
        }
        shape
    }

    /// Columns owned by `rank`.
    pub fn local_columns(&self, rank: usize) -> Range<usize> {
        let range = &self.ranges[rank];
        range.first * self.unit..range.end() * self.unit
    }

    /// Number of stored values (including padding) owned by `rank`.
    pub fn local_len(&self, rank: usize) -> usize {
        self.local_columns(rank).len() * self.row_stride
    }

    /// Largest local storage over all processes.
    pub fn max_local_len(&self) -> usize {
        (0..self.n_procs())
            .map(|rank| self.local_len(rank))
            .max()
            .unwrap_or(0)
    }

    /// Process owning a column.
    pub fn owner_of_column(&self, column: usize) -> usize {
        let unit = column / self.unit;
        self.ranges.upper_bound_by_key(&unit, |r| r.first) - 1
    }

    /// Process owning a cell given in canonical coordinates.
    pub fn owner_of_cell(&self, cell: [usize; 3]) -> usize {
        self.owner_of_column(self.column_of(cell))
    }

    /// Column holding a cell given in canonical coordinates.
    pub fn column_of(&self, cell: [usize; 3]) -> usize {
        cell[self.axes[0]] * self.dims[1] + cell[self.axes[1]]
    }

    /// Stride of each canonical axis in the local storage of any process.
    pub fn strides(&self) -> [usize; 3] {
        let mut strides = [0; 3];
        strides[self.axes[0]] = self.dims[1] * self.row_stride;
        strides[self.axes[1]] = self.row_stride;
        strides[self.axes[2]] = 1;
        strides
    }

    /// Offset of a cell owned by `rank` within that process's local storage.
    pub fn local_offset(&self, rank: usize, cell: [usize; 3]) -> usize {
        let first = self.local_columns(rank).start;
        (self.column_of(cell) - first) * self.row_stride + cell[self.axes[2]]
    }

    /// Canonical coordinates of the cell stored at `(column, position)`.
    pub fn cell_of(&self, column: usize, position: usize) -> [usize; 3] {
        let mut cell = [0; 3];
        cell[self.axes[0]] = column / self.dims[1];
        cell[self.axes[1]] = column % self.dims[1];
        cell[self.axes[2]] = position;
        cell
    }

    /// Every cell owned by `rank`, as local offset and canonical coordinates, in storage order.
    pub fn local_cells(&self, rank: usize) -> impl Iterator<Item = (usize, [usize; 3])> + '_ {
        let first = self.local_columns(rank).start;
        self.local_columns(rank).flat_map(move |column| {
            (0..self.dims[2]).map(move |position| {
                (
                    (column - first) * self.row_stride + position,
                    self.cell_of(column, position),
                )
            })
        })
    }

    /// Decompose the cells owned by `rank` into at most three rectangular blocks.
    pub fn blocks(&self, rank: usize) -> Vec<Block> {
        let columns = self.local_columns(rank);
        if columns.is_empty() {
            return Vec::new();
        }

        let d1 = self.dims[1];
        let (r0, c0) = (columns.start / d1, columns.start % d1);
        let (r1, c1) = (columns.end / d1, columns.end % d1);

        // Ranges over the two leading stored axes
        let mut stored = Vec::new();
        if r0 == r1 {
            stored.push((r0..r0 + 1, c0..c1));
        } else {
            let mut full_start = r0;
            if c0 > 0 {
                stored.push((r0..r0 + 1, c0..d1));
                full_start = r0 + 1;
            }
            if r1 > full_start {
                stored.push((full_start..r1, 0..d1));
            }
            if c1 > 0 {
                stored.push((r1..r1 + 1, 0..c1));
            }
        }

        stored
            .into_iter()
            .map(|(rows, cols)| {
                let mut lo = [0; 3];
                let mut hi = [0; 3];
                lo[self.axes[0]] = rows.start;
                hi[self.axes[0]] = rows.end;
                lo[self.axes[1]] = cols.start;
                hi[self.axes[1]] = cols.end;
                lo[self.axes[2]] = 0;
                hi[self.axes[2]] = self.dims[2];
                Block { lo, hi }
            })
            .collect_vec()
    }

    /// Whether every process owns exactly the same cells in both layouts, in which case moving
    /// between them needs no communication.
    pub fn same_ownership(&self, other: &Layout) -> bool {
        if self.shape() != other.shape() || self.n_procs() != other.n_procs() {
            return false;
        }

        (0..self.n_procs()).all(|rank| {
            let mine = self.blocks(rank);
            let theirs = other.blocks(rank);
            let volume: usize = mine.iter().map(|b| b.volume()).sum();
            let other_volume: usize = theirs.iter().map(|b| b.volume()).sum();
            let common: usize = mine
                .iter()
                .cartesian_product(theirs.iter())
                .filter_map(|(a, b)| a.intersect(b))
                .map(|b| b.volume())
                .sum();
            volume == other_volume && common == volume
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blocks_cover_local_cells() {
        let shape = [5, 7, 3];
        for n_procs in 1..=9 {
            // Rows of x, padded by one
            let layout = Layout::columns(shape, [1, 2, 0], 6, n_procs).unwrap();
            let mut seen = vec![0usize; 5 * 7 * 3];

            for rank in 0..n_procs {
                let blocks = layout.blocks(rank);
                assert!(blocks.len() <= 3);
                let volume: usize = blocks.iter().map(|b| b.volume()).sum();
                assert_eq!(volume, layout.local_columns(rank).len() * layout.dims[2]);

                for block in blocks {
                    for x in block.lo[0]..block.hi[0] {
                        for y in block.lo[1]..block.hi[1] {
                            for z in block.lo[2]..block.hi[2] {
                                assert_eq!(layout.owner_of_cell([x, y, z]), rank);
                                seen[(x * 7 + y) * 3 + z] += 1;
                            }
                        }
                    }
                }
            }

            assert!(seen.iter().all(|&s| s == 1));
        }
    }

    #[test]
    fn test_local_offsets_are_dense() {
        let shape = [4, 6, 5];
        let layout = Layout::slabs(shape, [0, 1, 2], 8, 3).unwrap();

        for rank in 0..3 {
            let mut offsets = Vec::new();
            for block in layout.blocks(rank) {
                for x in block.lo[0]..block.hi[0] {
                    for y in block.lo[1]..block.hi[1] {
                        for z in block.lo[2]..block.hi[2] {
                            offsets.push(layout.local_offset(rank, [x, y, z]));
                        }
                    }
                }
            }
            offsets.sort();
            let start = layout.local_columns(rank).start;
            let expected = layout
                .local_columns(rank)
                .flat_map(|c| (0..5).map(move |z| (c - start) * 8 + z))
                .collect_vec();
            assert_eq!(offsets, expected);
            assert!(offsets.iter().all(|&o| o < layout.local_len(rank)));
        }
    }

    #[test]
    fn test_local_cells_agree_with_offsets() {
        let layout = Layout::columns([3, 4, 5], [1, 2, 0], 4, 3).unwrap();
        for rank in 0..3 {
            let cells = layout.local_cells(rank).collect_vec();
            assert_eq!(cells.len(), layout.local_columns(rank).len() * 3);
            for (offset, cell) in cells {
                assert_eq!(offset, layout.local_offset(rank, cell));
                assert_eq!(layout.owner_of_cell(cell), rank);
            }
        }
    }

    #[test]
    fn test_strides_match_offsets() {
        let layout = Layout::columns([3, 4, 5], [2, 0, 1], 4, 2).unwrap();
        let strides = layout.strides();
        for rank in 0..2 {
            let blocks = layout.blocks(rank);
            let origin = layout.local_offset(rank, blocks[0].lo);
            for block in blocks.iter() {
                let cell = block.lo;
                let expected = origin as isize
                    + (0..3)
                        .map(|a| (cell[a] as isize - blocks[0].lo[a] as isize) * strides[a] as isize)
                        .sum::<isize>();
                assert_eq!(layout.local_offset(rank, cell) as isize, expected);
            }
        }
    }

    #[test]
    fn test_same_ownership() {
        let shape = [4, 3, 5];
        let a = Layout::slabs(shape, [0, 1, 2], 6, 2).unwrap();
        let b = Layout::slabs(shape, [0, 2, 1], 3, 2).unwrap();
        let c = Layout::slabs(shape, [1, 2, 0], 4, 2).unwrap();
        assert!(a.same_ownership(&b));
        assert!(!a.same_ownership(&c));
        assert!(a.same_ownership(&a));
    }

    #[test]
    fn test_too_many_processes() {
        assert!(matches!(
            Layout::slabs([4, 4, 4], [0, 1, 2], 6, 5),
            Err(PmError::Configuration(_))
        ));
        assert!(Layout::columns([4, 4, 4], [0, 1, 2], 6, 16).is_ok());
        assert!(matches!(
            Layout::columns([4, 4, 4], [0, 1, 2], 6, 17),
            Err(PmError::Configuration(_))
        ));
        assert!(matches!(
            Layout::columns([4, 4, 4], [0, 0, 2], 6, 1),
            Err(PmError::Configuration(_))
        ));
    }
}
