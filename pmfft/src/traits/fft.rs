//! Distributed transform traits
use crate::{
    decomposition::{GridSpec, Layout},
    traits::{general::PmScalar, parallel::Communicator, types::PmError},
};

/// Interface for distributed real-to-complex 3D transforms.
///
/// The real input is stored in [`DistributedFft::real_layout`], rows along z padded to
/// `2 * (nz / 2 + 1)`. The forward transform leaves the half spectrum, as interleaved complex
/// values, in [`DistributedFft::complex_layout`], which stores modes in `[y][z][x]` order. The
/// backward transform is the exact inverse, including the `1 / (nx * ny * nz)` normalisation.
///
/// Both directions work in place on a buffer of [`DistributedFft::fftsize`] values, the same
/// length on every process.
///
/// The partitioning strategy is fixed by the implementing type at construction and cannot be
/// changed afterwards.
pub trait DistributedFft<T>
where
    Self: Sized + Send + Sync,
    T: PmScalar,
{
    /// Human readable name of the partitioning strategy.
    const STRATEGY: &'static str;

    /// Plan a transform of `grid` over the processes of `comm`. Collective.
    ///
    /// # Arguments
    /// * `grid` - Transform grid.
    /// * `comm` - Communicator, every later call must use the same one.
    fn new<C: Communicator>(grid: GridSpec, comm: &C) -> Result<Self, PmError>;

    /// Transform grid.
    fn grid(&self) -> &GridSpec;

    /// Length of the buffer every process passes to the transforms.
    fn fftsize(&self) -> usize;

    /// Layout of the real, padded, input.
    fn real_layout(&self) -> &Layout;

    /// Layout of the complex output, elements counted in complex values.
    fn complex_layout(&self) -> &Layout;

    /// Forward real-to-complex transform, in place. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator the transform was planned on.
    /// * `data` - Buffer of length at least [`DistributedFft::fftsize`].
    fn forward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError>;

    /// Normalised backward complex-to-real transform, in place. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator the transform was planned on.
    /// * `data` - Buffer of length at least [`DistributedFft::fftsize`].
    fn backward<C: Communicator>(&self, comm: &C, data: &mut [T]) -> Result<(), PmError>;
}
