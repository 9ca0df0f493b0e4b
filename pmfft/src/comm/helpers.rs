//! Typed exchanges built on the byte level collectives.
use bytemuck::Pod;
use itertools::Itertools;
use log::debug;

use crate::{
    helpers::try_zeroed,
    traits::{parallel::Communicator, types::PmError},
};

/// Exclusive prefix sums of counts, the displacement of each rank's block in a packed buffer.
///
/// # Arguments
/// * `counts` - Number of elements per rank.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |acc, &x| {
            let tmp = *acc;
            *acc += x;
            Some(tmp)
        })
        .collect_vec()
}

/// Variable count all-to-all of typed elements with known receive counts.
///
/// # Arguments
/// * `comm` - Communicator.
/// * `send` - Elements packed by destination rank.
/// * `send_counts` - Elements destined for each rank.
/// * `recv` - Receive buffer, packed by source rank.
/// * `recv_counts` - Elements expected from each rank.
pub fn all_to_all_varcount_into<E: Pod, C: Communicator>(
    comm: &C,
    send: &[E],
    send_counts: &[usize],
    recv: &mut [E],
    recv_counts: &[usize],
) -> Result<(), PmError> {
    let size = std::mem::size_of::<E>();
    let send_bytes = send_counts.iter().map(|c| c * size).collect_vec();
    let recv_bytes = recv_counts.iter().map(|c| c * size).collect_vec();

    debug!(
        "rank {} exchanging {} elements out, {} elements in",
        comm.rank(),
        send.len(),
        recv.len()
    );

    comm.all_to_all_bytes(
        bytemuck::cast_slice(send),
        &send_bytes,
        bytemuck::cast_slice_mut(recv),
        &recv_bytes,
    )
}

/// Variable count all-to-all of typed elements, receive counts found with a count pass first.
///
/// Returns the received elements packed by source rank, and the count received from each rank.
///
/// # Arguments
/// * `comm` - Communicator.
/// * `send` - Elements packed by destination rank.
/// * `send_counts` - Elements destined for each rank.
pub fn all_to_all_varcount<E: Pod, C: Communicator>(
    comm: &C,
    send: &[E],
    send_counts: &[usize],
) -> Result<(Vec<E>, Vec<usize>), PmError> {
    let recv_counts = comm.all_to_all_counts(send_counts)?;
    let mut recv = try_zeroed::<E>(recv_counts.iter().sum())?;
    all_to_all_varcount_into(comm, send, send_counts, &mut recv, &recv_counts)?;
    Ok((recv, recv_counts))
}
