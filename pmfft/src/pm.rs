//! # Particle-Mesh Gravity
//!
//! Long range gravitational forces on a distributed particle set, evaluated on a uniform mesh.
//! An evaluation deposits particle masses with the cloud-in-cell stencil, transforms the mesh
//! with a [`crate::traits::fft::DistributedFft`], multiplies by a cached [`ForceKernel`],
//! transforms back and interpolates the result at the particles with the same stencil.
//!
//! Two [`crate::traits::mesh::MeshAssignment`] strategies move data between particles and mesh:
//!
//! * [`PointToPoint`] merges contributions per cell and sends them to the owning processes,
//!   suited to clustered (zoom) particle sets.
//! * [`Bulk`] ships whole particles to the processes owning their stencil, suited to particles
//!   spread over the whole box.
//!
//! ## Example
//!
//! ```
//! use pmfft::{
//!     comm::LocalCommunicator,
//!     engine::SlabFft,
//!     helpers::particles_fixture,
//!     pm::{Particles, PmBuilder, PointToPoint},
//! };
//!
//! let (positions, masses) = particles_fixture::<f64>(100, None);
//!
//! let accelerations = LocalCommunicator::run(2, |comm| {
//!     // Every process holds the same particles here, real runs split them
//!     let particles = Particles::new(&positions, &masses).unwrap();
//!     let pm = PmBuilder::new()
//!         .grid(16)
//!         .unwrap()
//!         .build::<f64, _, SlabFft<f64>, PointToPoint>(comm)
//!         .unwrap();
//!     pm.accelerations(&particles).unwrap()
//! });
//!
//! assert_eq!(accelerations[0].len(), 300);
//! ```
pub mod builder;
pub mod cic;
pub mod finite_difference;
pub mod kernel;
pub mod solver;
pub mod types;
pub mod uniform;
pub mod zoom;

pub use builder::DEFAULT_SPLIT_SCALE;
pub use types::{
    FiniteDifference, ForceKernel, ForceMethod, KernelVariant, MeshGeometry, ParticleMesh,
    Particles, PmBuilder, PmConfig,
};
pub use uniform::{Bulk, BulkState};
pub use zoom::{PointToPoint, ZoomState};
