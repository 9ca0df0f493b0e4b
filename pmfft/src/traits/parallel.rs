//! Interfaces to the set of cooperating processes a distributed grid lives on.
use crate::traits::types::PmError;

/// A fixed group of processes taking part in every collective call.
///
/// All methods are collective except [`Communicator::rank`] and [`Communicator::size`]: every
/// process of the group has to enter them, in the same order, before any of them returns.
/// Failures are reported as [`PmError::Communication`] and are fatal to the run.
pub trait Communicator {
    /// Rank of this process, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Block until every process has reached the barrier.
    fn barrier(&self) -> Result<(), PmError>;

    /// Send one count to every peer, receive one count from every peer.
    ///
    /// # Arguments
    /// * `send_counts` - Value destined for each rank, of length `size()`.
    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>, PmError>;

    /// Variable count all-to-all exchange of raw bytes.
    ///
    /// Blocks are laid out contiguously in rank order, so displacements are the exclusive
    /// prefix sums of the counts.
    ///
    /// # Arguments
    /// * `send` - Packed send buffer.
    /// * `send_counts` - Bytes destined for each rank.
    /// * `recv` - Receive buffer, of length `recv_counts.iter().sum()`.
    /// * `recv_counts` - Bytes expected from each rank.
    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_counts: &[usize],
        recv: &mut [u8],
        recv_counts: &[usize],
    ) -> Result<(), PmError>;

    /// Element-wise global sum, result available on every process.
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<(), PmError>;

    /// Global maximum, result available on every process.
    fn all_reduce_max(&self, value: usize) -> Result<usize, PmError>;
}
