//! # Local Transforms
//!
//! Batched one dimensional transforms applied to the locally owned part of a distributed grid.
//! Plans are built once, for a fixed length and batch geometry, and executed any number of times.
//!
//! # Features
//! * Complex-to-complex transforms over batches of (optionally strided) sequences.
//! * Real-to-complex and complex-to-real transforms over padded rows, in place, so that a real
//!   row of length `n` stored with `2 * (n / 2 + 1)` values is overwritten by its half spectrum.
//! * Batches are distributed over threads with rayon.
//!
//! Transforms are unnormalised in both directions, scaling is left to the caller.
pub mod c2c;
pub mod helpers;
pub mod r2c;
pub mod types;

pub use c2c::C2cPlan;
pub use r2c::{C2rPlan, R2cPlan};
pub use types::{FftError, Sign};
