//! # Power Spectrum Estimation
//!
//! Binned estimates of the matter power spectrum of a distributed particle set, computed with the
//! same mesh assignment and distributed transforms as the force calculation. Folding the particle
//! positions, `x -> f x mod 1`, maps small scales of the box onto the mesh, so that a sequence of
//! folded estimates extends the measured range of wavenumbers by the fold factor each time
//! without a finer mesh.
pub mod estimator;
pub mod types;

pub use estimator::{DEFAULT_BINS, FOLD_FACTOR};
pub use types::{Binning, PowerSpectrum, PowerSpectrumBin, PowerSpectrumEstimator};
