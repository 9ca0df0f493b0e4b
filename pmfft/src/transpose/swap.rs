//! Local axis permutation between layouts with identical ownership.
use bytemuck::Pod;

use crate::{
    decomposition::Layout,
    traits::types::PmError,
    transpose::remap::visit_block,
};

/// Permute the local storage order of a grid without communication.
///
/// Only valid when `source` and `dest` give every process the same cells, as is the case when
/// both layouts partition the same leading axis.
///
/// # Arguments
/// * `source` - Layout of `input`.
/// * `dest` - Layout of `output`.
/// * `rank` - Rank of the calling process.
/// * `input` - Local data in the source layout.
/// * `output` - Local data in the destination layout.
pub fn local_swap<E: Pod>(
    source: &Layout,
    dest: &Layout,
    rank: usize,
    input: &[E],
    output: &mut [E],
) -> Result<(), PmError> {
    if !source.same_ownership(dest) {
        return Err(PmError::Configuration(format!(
            "layouts {:?} and {:?} distribute cells differently, a local swap is not possible",
            source.axes, dest.axes
        )));
    }
    if input.len() < source.local_len(rank) || output.len() < dest.local_len(rank) {
        return Err(PmError::InvalidInput(format!(
            "swap buffers of {} and {} values are shorter than the local layouts",
            input.len(),
            output.len()
        )));
    }

    let source_strides = source.strides();
    let dest_strides = dest.strides();

    for block in source.blocks(rank).iter() {
        let mut read = Vec::with_capacity(block.volume());
        visit_block(
            block,
            dest.axes,
            source_strides,
            source.local_offset(rank, block.lo),
            |offset| read.push(input[offset]),
        );

        // Write in destination storage order, so the innermost loop is contiguous in `output`
        let mut values = read.into_iter();
        visit_block(
            block,
            dest.axes,
            dest_strides,
            dest.local_offset(rank, block.lo),
            |offset| {
                if let Some(value) = values.next() {
                    output[offset] = value;
                }
            },
        );
    }

    Ok(())
}
