//! Count and data passes of a remap between layouts.
use bytemuck::Pod;
use itertools::Itertools;
use log::debug;

use crate::{
    comm::helpers::{all_to_all_varcount_into, displacements},
    decomposition::{Block, Layout},
    helpers::try_zeroed,
    traits::{parallel::Communicator, types::PmError},
    transpose::types::ExchangeDescriptor,
};

/// Visit the local offsets of every cell of a block.
///
/// Cells are visited with `order[0]` slowest and `order[2]` fastest; offsets are computed from
/// the per axis `strides` of the layout holding the data.
///
/// # Arguments
/// * `block` - Cells to visit.
/// * `order` - Canonical axes from slowest to fastest.
/// * `strides` - Local stride of each canonical axis.
/// * `base` - Local offset of `block.lo`.
/// * `f` - Called with each offset.
pub(crate) fn visit_block(
    block: &Block,
    order: [usize; 3],
    strides: [usize; 3],
    base: usize,
    mut f: impl FnMut(usize),
) {
    let [a0, a1, a2] = order;
    let extent = |a: usize| block.hi[a] - block.lo[a];

    for i0 in 0..extent(a0) {
        for i1 in 0..extent(a1) {
            let row = base + i0 * strides[a0] + i1 * strides[a1];
            for i2 in 0..extent(a2) {
                f(row + i2 * strides[a2]);
            }
        }
    }
}

/// Pairwise overlaps of the source cells of `from` with the destination cells of `to`.
fn overlaps(source: &Layout, dest: &Layout, from: usize, to: usize) -> Vec<Block> {
    source
        .blocks(from)
        .iter()
        .cartesian_product(dest.blocks(to).iter())
        .filter_map(|(a, b)| a.intersect(b))
        .collect_vec()
}

impl ExchangeDescriptor {
    /// Count pass.
    ///
    /// Derives what this process sends to and receives from every peer when moving a grid from
    /// `source` to `dest`, and confirms the receive sizes with the peers. Collective.
    ///
    /// # Arguments
    /// * `source` - Layout the data is moved out of.
    /// * `dest` - Layout the data is moved into.
    /// * `comm` - Communicator the layouts are distributed over.
    pub fn count<C: Communicator>(
        source: &Layout,
        dest: &Layout,
        comm: &C,
    ) -> Result<Self, PmError> {
        let size = comm.size();
        let rank = comm.rank();

        if source.shape() != dest.shape() {
            return Err(PmError::Configuration(format!(
                "cannot remap between grids of shape {:?} and {:?}",
                source.shape(),
                dest.shape()
            )));
        }
        if source.n_procs() != size || dest.n_procs() != size {
            return Err(PmError::Configuration(format!(
                "layouts planned for {} and {} processes used on {}",
                source.n_procs(),
                dest.n_procs(),
                size
            )));
        }

        let send_blocks = (0..size)
            .map(|peer| overlaps(source, dest, rank, peer))
            .collect_vec();
        let recv_blocks = (0..size)
            .map(|peer| overlaps(source, dest, peer, rank))
            .collect_vec();

        let volume = |blocks: &Vec<Block>| blocks.iter().map(|b| b.volume()).sum::<usize>();
        let send_counts = send_blocks.iter().map(volume).collect_vec();
        let recv_counts = recv_blocks.iter().map(volume).collect_vec();

        let confirmed = comm.all_to_all_counts(&send_counts)?;
        if confirmed != recv_counts {
            return Err(PmError::Communication(format!(
                "rank {} expects {:?} values but peers announce {:?}",
                rank, recv_counts, confirmed
            )));
        }

        debug!(
            "rank {} remap {:?} -> {:?}: sending {:?}, receiving {:?}",
            rank, source.axes, dest.axes, send_counts, recv_counts
        );

        Ok(Self {
            source: source.clone(),
            dest: dest.clone(),
            rank,
            send_offsets: displacements(&send_counts),
            recv_offsets: displacements(&recv_counts),
            send_counts,
            recv_counts,
            send_blocks,
            recv_blocks,
        })
    }

    /// Total number of values sent by this process.
    pub fn send_volume(&self) -> usize {
        self.send_counts.iter().sum()
    }

    /// Total number of values received by this process.
    pub fn recv_volume(&self) -> usize {
        self.recv_counts.iter().sum()
    }

    /// Data pass. Collective.
    ///
    /// Values of `input` stored in the `source` layout are written to their positions in the
    /// `dest` layout in `output`. Padding of `output` is left untouched.
    ///
    /// # Arguments
    /// * `source` - Layout of `input`, must match the one the descriptor was counted for.
    /// * `dest` - Layout of `output`, must match the one the descriptor was counted for.
    /// * `comm` - Communicator.
    /// * `input` - Local data in the source layout.
    /// * `output` - Local data in the destination layout.
    pub fn exchange<E: Pod, C: Communicator>(
        &self,
        source: &Layout,
        dest: &Layout,
        comm: &C,
        input: &[E],
        output: &mut [E],
    ) -> Result<(), PmError> {
        if *source != self.source || *dest != self.dest {
            return Err(PmError::Configuration(format!(
                "descriptor counted for {:?} -> {:?} used for {:?} -> {:?}",
                self.source.axes, self.dest.axes, source.axes, dest.axes
            )));
        }
        if comm.rank() != self.rank {
            return Err(PmError::Configuration(format!(
                "descriptor counted on rank {} used on rank {}",
                self.rank,
                comm.rank()
            )));
        }
        if input.len() < source.local_len(self.rank) || output.len() < dest.local_len(self.rank) {
            return Err(PmError::InvalidInput(format!(
                "remap buffers of {} and {} values are shorter than the local layouts",
                input.len(),
                output.len()
            )));
        }

        let source_strides = source.strides();
        let dest_strides = dest.strides();

        // Pack in source storage order
        let mut send = try_zeroed::<E>(self.send_volume())?;
        let mut position = 0;
        for block in self.send_blocks.iter().flatten() {
            let base = source.local_offset(self.rank, block.lo);
            visit_block(block, source.axes, source_strides, base, |offset| {
                send[position] = input[offset];
                position += 1;
            });
        }

        let mut recv = try_zeroed::<E>(self.recv_volume())?;
        all_to_all_varcount_into(comm, &send, &self.send_counts, &mut recv, &self.recv_counts)?;

        // Unpack with the sender's traversal order
        let mut position = 0;
        for block in self.recv_blocks.iter().flatten() {
            let base = dest.local_offset(self.rank, block.lo);
            visit_block(block, source.axes, dest_strides, base, |offset| {
                output[offset] = recv[position];
                position += 1;
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::comm::LocalCommunicator;
    use crate::decomposition::GridSpec;

    /// Fill the local part of a layout with the canonical flat index of each cell.
    fn flat_index_field(layout: &Layout, grid: &GridSpec, rank: usize) -> Vec<u64> {
        let mut data = vec![u64::MAX; layout.local_len(rank)];
        for column in layout.local_columns(rank) {
            for position in 0..layout.dims[2] {
                let cell = layout.cell_of(column, position);
                data[layout.local_offset(rank, cell)] = grid.flat_index(cell) as u64;
            }
        }
        data
    }

    #[test]
    fn test_transpose_identity() {
        let grid = GridSpec::new(6, 5, 7).unwrap();

        for n_procs in 1..=4 {
            LocalCommunicator::run(n_procs, |comm| {
                let rank = comm.rank();
                let x_slabs = Layout::slabs(grid.shape(), [0, 1, 2], grid.nz2, n_procs).unwrap();
                let y_slabs = Layout::slabs(grid.shape(), [1, 2, 0], grid.nx, n_procs).unwrap();

                let forward = ExchangeDescriptor::count(&x_slabs, &y_slabs, comm).unwrap();
                let backward = ExchangeDescriptor::count(&y_slabs, &x_slabs, comm).unwrap();

                let input = flat_index_field(&x_slabs, &grid, rank);
                let mut transposed = vec![u64::MAX; y_slabs.local_len(rank)];
                forward
                    .exchange(&x_slabs, &y_slabs, comm, &input, &mut transposed)
                    .unwrap();
                assert_eq!(transposed, flat_index_field(&y_slabs, &grid, rank));

                let mut output = vec![u64::MAX; x_slabs.local_len(rank)];
                backward
                    .exchange(&y_slabs, &x_slabs, comm, &transposed, &mut output)
                    .unwrap();
                assert_eq!(output, input);
            });
        }
    }

    #[test]
    fn test_column_remaps_conserve_volume() {
        let grid = GridSpec::new(4, 6, 5).unwrap();
        let n_procs = 3;

        let results = LocalCommunicator::run(n_procs, |comm| {
            let rank = comm.rank();
            let xy = Layout::columns(grid.shape(), [0, 1, 2], grid.nz, n_procs).unwrap();
            let xz = Layout::columns(grid.shape(), [0, 2, 1], grid.ny, n_procs).unwrap();
            let yz = Layout::columns(grid.shape(), [1, 2, 0], grid.nx, n_procs).unwrap();

            let first = ExchangeDescriptor::count(&xy, &xz, comm).unwrap();
            let second = ExchangeDescriptor::count(&xz, &yz, comm).unwrap();

            let input = flat_index_field(&xy, &grid, rank);
            let mut middle = vec![0u64; xz.local_len(rank)];
            let mut output = vec![0u64; yz.local_len(rank)];
            first.exchange(&xy, &xz, comm, &input, &mut middle).unwrap();
            second.exchange(&xz, &yz, comm, &middle, &mut output).unwrap();

            assert_eq!(output, flat_index_field(&yz, &grid, rank));
            (first.send_volume(), first.recv_volume())
        });

        let sent: usize = results.iter().map(|r| r.0).sum();
        let received: usize = results.iter().map(|r| r.1).sum();
        assert_eq!(sent, grid.volume());
        assert_eq!(received, grid.volume());
    }

    #[test]
    fn test_descriptor_refuses_other_layouts() {
        let grid = GridSpec::new(4, 4, 4).unwrap();
        LocalCommunicator::run(2, |comm| {
            let a = Layout::slabs(grid.shape(), [0, 1, 2], 4, 2).unwrap();
            let b = Layout::slabs(grid.shape(), [1, 2, 0], 4, 2).unwrap();
            let c = Layout::columns(grid.shape(), [1, 2, 0], 4, 2).unwrap();

            let descriptor = ExchangeDescriptor::count(&a, &b, comm).unwrap();
            let input = vec![0f64; 32];
            let mut output = vec![0f64; 32];
            let result = descriptor.exchange(&a, &c, comm, &input, &mut output);
            assert!(matches!(result, Err(PmError::Configuration(_))));
        });
    }
}
