//! Data structures for power spectrum estimation.
use std::marker::PhantomData;

use crate::{
    pm::MeshGeometry,
    traits::{
        fft::DistributedFft, general::PmScalar, mesh::MeshAssignment, parallel::Communicator,
    },
};

/// Spacing of wavenumber bins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Binning {
    /// Equal width in `k`.
    Linear,

    /// Equal width in `log k`.
    #[default]
    Logarithmic,
}

/// Averages over the modes falling in one wavenumber bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerSpectrumBin {
    /// Mean wavenumber of the modes in the bin.
    pub k: f64,

    /// Mean power, deconvolved with the assignment window.
    pub power: f64,

    /// Dimensionless power `k^3 P(k) / (2 pi^2)`.
    pub delta2: f64,

    /// Number of modes, counting both members of each conjugate pair.
    pub modes: u64,

    /// Shot noise expected from a discrete particle set, not subtracted from `power`.
    pub shot_noise: f64,
}

/// Estimate at one fold factor.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerSpectrum {
    /// Fold factor the estimate was measured at.
    pub fold: usize,

    /// Non empty bins, in increasing `k`.
    pub bins: Vec<PowerSpectrumBin>,

    /// Global number of particles.
    pub n_particles: u64,

    /// Global mass.
    pub total_mass: f64,
}

/// Power spectrum estimator on a periodic cubic mesh.
pub struct PowerSpectrumEstimator<'c, T, C, F, A>
where
    T: PmScalar,
    C: Communicator,
    F: DistributedFft<T>,
    A: MeshAssignment<T>,
{
    /// Communicator every estimate runs on.
    pub comm: &'c C,

    /// Mesh geometry.
    pub geometry: MeshGeometry,

    /// Side length of the box.
    pub box_size: f64,

    /// Distributed transform.
    pub fft: F,

    /// Number of wavenumber bins.
    pub n_bins: usize,

    pub(crate) scalar: PhantomData<T>,

    pub(crate) assignment: PhantomData<A>,
}
