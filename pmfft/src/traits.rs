//! # Trait Definitions
pub mod fft;
pub mod general;
pub mod mesh;
pub mod parallel;
pub mod types;
