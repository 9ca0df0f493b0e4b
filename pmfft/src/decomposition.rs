//! # Decomposition Planner
//!
//! Computes which process owns which part of the transform grid in every layout a distributed
//! transform visits. Ownership is always expressed as contiguous ranges of *columns*: a layout
//! stores the grid with its axes in some order, the two leading stored axes are flattened into a
//! column index and the last stored axis runs contiguously along each column. Slabs are the
//! special case where columns are handed out in groups of whole rows of the leading axis.
//!
//! Ranges are balanced: for `n` units over `p` processes every process gets `n / p` units and the
//! first `n % p` processes get one more.
pub mod layout;
pub mod planner;
pub mod types;

pub use planner::{balanced_ranges, ColumnPlan, SlabPlan};
pub use types::{Block, GridSpec, Layout, ProcessRange};
