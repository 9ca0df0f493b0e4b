//! # Distributed Particle-Mesh Gravity
//!
//! Long range gravity for distributed particle sets, evaluated on a uniform mesh through a
//! distributed three dimensional FFT.
//!
//! Notable features of this library are:
//! * Slab and column (pencil) decomposed real-to-complex transforms, with remaps planned once by
//!   a count pass and replayed by a data pass on every transform.
//! * Point-to-point and bulk cloud-in-cell assignment, chosen as a type at construction.
//! * Periodic, isolated and tall box boundary conditions, spectral or finite difference forces.
//! * Binned, folded power spectrum estimates on the same transforms.
//! * Any process count without MPI through an in-process communicator, and MPI through the
//!   optional `mpi` feature.
//!
//! ## Example
//!
//! ```
//! use pmfft::{ColumnFft, DistributedFft, GridSpec, LocalCommunicator};
//!
//! let grid = GridSpec::new(8, 8, 8).unwrap();
//! LocalCommunicator::run(3, |comm| {
//!     let fft = ColumnFft::<f64>::new(grid, comm).unwrap();
//!     let mut data = vec![0f64; fft.fftsize()];
//!     fft.forward(comm, &mut data).unwrap();
//!     fft.backward(comm, &mut data).unwrap();
//! });
//! ```
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod comm;
pub mod decomposition;
pub mod engine;
pub mod fft;
pub mod helpers;
pub mod pm;
pub mod powerspec;
pub mod traits;
pub mod transpose;

// Public API
#[doc(inline)]
pub use comm::LocalCommunicator;
#[doc(inline)]
pub use decomposition::GridSpec;
#[doc(inline)]
pub use engine::{ColumnFft, SlabFft};
#[doc(inline)]
pub use pm::{Bulk, ParticleMesh, Particles, PmBuilder, PointToPoint};
#[doc(inline)]
pub use powerspec::{Binning, PowerSpectrumEstimator};
#[doc(inline)]
pub use traits::{fft::DistributedFft, mesh::MeshAssignment, parallel::Communicator, types::PmError};
