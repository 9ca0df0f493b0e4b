//! # Communicators
//!
//! Implementations of [`crate::traits::parallel::Communicator`].
//!
//! * [`LocalCommunicator`] runs a group of processes as threads of the current program, so any
//!   process count can be exercised without an MPI installation.
//! * With the `mpi` feature, `mpi::topology::SimpleCommunicator` implements the trait directly.
pub mod helpers;
pub mod local;
#[cfg(feature = "mpi")]
pub mod multi_node;

pub use helpers::{all_to_all_varcount, all_to_all_varcount_into, displacements};
pub use local::LocalCommunicator;
