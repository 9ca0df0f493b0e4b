//! Data structures for transposes.
use crate::decomposition::{Block, Layout};

/// Result of the count pass of an exchange between two layouts, as seen by one process.
///
/// Blocks sent to a peer are listed in the same order the peer lists the blocks it receives, so
/// that values packed in source storage order are unpacked without any index metadata.
#[derive(Clone, Debug)]
pub struct ExchangeDescriptor {
    /// Layout the data is moved out of.
    pub source: Layout,

    /// Layout the data is moved into.
    pub dest: Layout,

    /// Rank the descriptor was computed for.
    pub rank: usize,

    /// Number of values sent to each peer.
    pub send_counts: Vec<usize>,

    /// Offset of each peer's values in the packed send buffer.
    pub send_offsets: Vec<usize>,

    /// Number of values received from each peer.
    pub recv_counts: Vec<usize>,

    /// Offset of each peer's values in the packed receive buffer.
    pub recv_offsets: Vec<usize>,

    /// Overlaps of this process's source cells with each peer's destination cells.
    pub send_blocks: Vec<Vec<Block>>,

    /// Overlaps of each peer's source cells with this process's destination cells.
    pub recv_blocks: Vec<Vec<Block>>,
}
