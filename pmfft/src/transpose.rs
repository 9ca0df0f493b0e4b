//! # Transpose and Remap
//!
//! Moves a distributed grid between two [`crate::decomposition::Layout`]s. Every exchange is
//! split into a count pass, which intersects the ownership blocks of both layouts and agrees on
//! message sizes with all peers, and a data pass that packs, exchanges and unpacks values. The
//! count pass yields an [`ExchangeDescriptor`] which is cached and reused by every data pass
//! between the same pair of layouts.
//!
//! When both layouts give every process the same cells, only the local storage order changes and
//! [`local_swap`] permutes the data without communication.
pub mod remap;
pub mod swap;
pub mod types;

pub use swap::local_swap;
pub use types::ExchangeDescriptor;
