//! Data structures for particle-mesh gravity.
use std::marker::PhantomData;

use num_complex::Complex;

use crate::{
    decomposition::GridSpec,
    engine::Transition,
    traits::{
        fft::DistributedFft, general::PmScalar, mesh::MeshAssignment, parallel::Communicator,
    },
};

/// How accelerations are obtained from the potential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForceMethod {
    /// Differentiate in Fourier space, one backward transform per component.
    #[default]
    Spectral,

    /// One backward transform for the potential, then a four point finite difference along each
    /// axis in a layout where that axis is local.
    FiniteDifference,
}

/// Boundary conditions of the gravitational potential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelVariant {
    /// Periodic box, Green's function evaluated analytically in Fourier space.
    #[default]
    Periodic,

    /// Isolated (vacuum) boundaries, real space Green's function on a doubled, zero padded grid.
    Isolated,

    /// Periodic across two axes and isolated along `axis`, for boxes elongated in the isolated
    /// direction. Only that axis is doubled and zero padded.
    TallBox {
        /// Isolated axis, 0 for x, 1 for y and 2 for z.
        axis: usize,
    },
}

/// Validated particle-mesh parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PmConfig {
    /// Cells along an axis of unit stretch.
    pub pm_grid: usize,

    /// Side length of a box of unit stretch.
    pub box_size: f64,

    /// Elongation factor of each axis, axis `a` spans `box_size / stretch[a]`.
    pub stretch: [usize; 3],

    /// Gravitational constant.
    pub gravity: f64,

    /// Smoothing scale of the long range force, in mesh cells. Zero disables the split.
    pub split_scale: f64,

    /// Force extraction.
    pub force_method: ForceMethod,

    /// Boundary conditions.
    pub kernel: KernelVariant,
}

/// Builder for [`PmConfig`] and [`ParticleMesh`].
#[derive(Clone, Debug, Default)]
pub struct PmBuilder {
    /// Cells along an axis of unit stretch.
    pub pm_grid: Option<usize>,

    /// Side length of a box of unit stretch.
    pub box_size: Option<f64>,

    /// Elongation factors.
    pub stretch: Option<[usize; 3]>,

    /// Gravitational constant.
    pub gravity: Option<f64>,

    /// Long range smoothing scale in cells.
    pub split_scale: Option<f64>,

    /// Force extraction.
    pub force_method: Option<ForceMethod>,

    /// Boundary conditions.
    pub kernel: Option<KernelVariant>,
}

/// Geometry of the mesh particles are assigned to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshGeometry {
    /// Cells spanned by the particle domain along each axis.
    pub mesh: [usize; 3],

    /// Transform grid. Equal to `mesh` for periodic boundaries, doubled along every isolated axis.
    pub grid: GridSpec,

    /// Edge length of a cell, the same along every axis.
    pub cell_size: f64,

    /// Physical extent of the particle domain along each axis.
    pub extent: [f64; 3],
}

/// Local particles, borrowed from the caller.
#[derive(Clone, Copy, Debug)]
pub struct Particles<'a, T> {
    /// Interleaved positions `[x0, y0, z0, x1, ...]`, as fractions of the domain extent.
    pub positions: &'a [T],

    /// Masses.
    pub masses: &'a [T],
}

/// Link from one corner of a particle's stencil to a mesh cell, used when contributions are
/// sent point-to-point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshContribution<I> {
    /// Flat index of the cell in the global mesh.
    pub global: I,

    /// Local particle index shifted by three bits, the low bits select the stencil corner.
    pub part: usize,

    /// Index into the local field of distinct cells.
    pub local: usize,
}

/// Fourier space multipliers turning the transformed mass mesh into the transformed potential,
/// one per locally owned mode of the complex layout.
#[derive(Clone, Debug)]
pub struct ForceKernel<T> {
    /// Multipliers in the local storage order of the complex layout.
    pub values: Vec<Complex<T>>,

    /// Boundary conditions the kernel was built for.
    pub variant: KernelVariant,
}

/// Remaps used by finite difference force extraction.
#[derive(Clone, Debug)]
pub struct FiniteDifference {
    /// Real layout to columns over (x, z), y local.
    pub xz: Transition,

    /// Real layout to columns over (z, y), x local.
    pub zy: Transition,

    /// Rank the remaps were planned on.
    pub rank: usize,
}

/// Particle-mesh gravity solver.
///
/// The transform strategy `F` and assignment strategy `A` are fixed at construction. The solver
/// owns its transform plan and kernel, the communicator is borrowed.
pub struct ParticleMesh<'c, T, C, F, A>
where
    T: PmScalar,
    C: Communicator,
    F: DistributedFft<T>,
    A: MeshAssignment<T>,
{
    /// Communicator every evaluation runs on.
    pub comm: &'c C,

    /// Parameters.
    pub config: PmConfig,

    /// Mesh geometry.
    pub geometry: MeshGeometry,

    /// Distributed transform.
    pub fft: F,

    /// Cached Green's function.
    pub kernel: ForceKernel<T>,

    /// Remaps for finite difference force extraction, when selected.
    pub finite_difference: Option<FiniteDifference>,

    pub(crate) assignment: PhantomData<A>,
}
