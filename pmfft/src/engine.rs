//! # Distributed Transform Engines
//!
//! Two implementations of [`crate::traits::fft::DistributedFft`], differing in how the grid is
//! partitioned.
//!
//! * [`SlabFft`] partitions whole planes. Forward: real-to-complex along z and complex-to-complex
//!   along y on x-slabs, one global transpose to y-slabs, complex-to-complex along x. Scales to
//!   at most `min(nx, ny)` processes.
//! * [`ColumnFft`] partitions single columns (pencils). Forward: real-to-complex along z in XY
//!   columns, remap to columns over (x, z) and transform along y, remap to columns over (y, z)
//!   and transform along x. Scales to `min(nx * ny, nx * nzc, ny * nzc)` processes.
//!
//! Both leave the spectrum in `[y][z][x]` order and share the same buffer length rule, so either
//! can be dropped into the particle-mesh pipeline.
pub mod column;
pub mod slab;
pub mod transition;
pub mod types;

pub use types::{ColumnFft, SlabFft, Transition};
