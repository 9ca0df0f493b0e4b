//! Mesh assignment traits
use crate::{
    decomposition::Layout,
    pm::types::{MeshGeometry, Particles},
    traits::{general::PmScalar, parallel::Communicator, types::PmError},
};

/// Interface for moving particle data onto a distributed mesh and back.
///
/// Implementations differ only in how contributions reach the processes owning the mesh cells,
/// both use the cloud-in-cell stencil of [`crate::pm::cic`] so that interpolation is the exact
/// adjoint of assignment. Strategies are chosen as a type parameter of
/// [`crate::pm::ParticleMesh`] and cannot be changed after construction.
pub trait MeshAssignment<T>
where
    Self: Send + Sync,
    T: PmScalar,
{
    /// Bookkeeping produced by a deposit and consumed by every read-out of the same evaluation.
    type State: Send;

    /// Human readable name of the strategy.
    const STRATEGY: &'static str;

    /// Add the mass of every local particle to the mesh. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator.
    /// * `layout` - Real layout of the mesh.
    /// * `geometry` - Mesh geometry.
    /// * `particles` - Local particles.
    /// * `rho` - Local part of the mesh, in `layout`, accumulated into.
    fn deposit<C: Communicator>(
        comm: &C,
        layout: &Layout,
        geometry: &MeshGeometry,
        particles: &Particles<'_, T>,
        rho: &mut [T],
    ) -> Result<Self::State, PmError>;

    /// Interpolate a mesh field at the position of every local particle. Collective.
    ///
    /// # Arguments
    /// * `comm` - Communicator.
    /// * `layout` - Real layout of the mesh.
    /// * `geometry` - Mesh geometry.
    /// * `state` - Result of the deposit of the same particles.
    /// * `particles` - Local particles, as passed to the deposit.
    /// * `grid` - Local part of the field, in `layout`.
    fn readout<C: Communicator>(
        comm: &C,
        layout: &Layout,
        geometry: &MeshGeometry,
        state: &Self::State,
        particles: &Particles<'_, T>,
        grid: &[T],
    ) -> Result<Vec<T>, PmError>;
}
