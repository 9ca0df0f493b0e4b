//! Data structures for distributed transforms.
use crate::{
    decomposition::{ColumnPlan, Layout, SlabPlan},
    fft::{C2cPlan, C2rPlan, R2cPlan},
    traits::general::PmScalar,
    transpose::ExchangeDescriptor,
};

/// How data moves between two consecutive layouts of a transform.
#[derive(Clone, Debug)]
pub enum TransitionKind {
    /// Ownership differs, data is exchanged with cached descriptors for both directions.
    Remap {
        /// Count pass from source to destination.
        forward: ExchangeDescriptor,

        /// Count pass from destination to source.
        backward: ExchangeDescriptor,
    },

    /// Ownership is identical, the local storage order is permuted.
    Swap,
}

/// One change of layout, planned once at construction.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Layout before the transition in the forward direction.
    pub source: Layout,

    /// Layout after the transition in the forward direction.
    pub dest: Layout,

    /// Exchange or local permutation.
    pub kind: TransitionKind,

    /// Rank the transition was planned on.
    pub rank: usize,
}

/// Local one dimensional plans of a slab transform.
pub struct SlabPlans<T: PmScalar> {
    /// Real-to-complex along z, one row per `(x, y)` of the local x-slabs.
    pub r2c_z: R2cPlan<T>,

    /// Complex-to-real along z.
    pub c2r_z: C2rPlan<T>,

    /// Forward along y, strided, applied per x-slab.
    pub forward_y: C2cPlan<T>,

    /// Backward along y.
    pub backward_y: C2cPlan<T>,

    /// Forward along x, contiguous rows of the local y-slabs.
    pub forward_x: C2cPlan<T>,

    /// Backward along x.
    pub backward_x: C2cPlan<T>,
}

/// Distributed transform partitioned into slabs.
pub struct SlabFft<T: PmScalar> {
    /// Layouts visited.
    pub plan: SlabPlan,

    /// Rank the transform was planned on.
    pub rank: usize,

    /// Local transforms.
    pub plans: SlabPlans<T>,

    /// x-slabs to y-slabs.
    pub transpose: Transition,
}

/// Local one dimensional plans of a column transform.
pub struct ColumnPlans<T: PmScalar> {
    /// Real-to-complex along z, one row per local XY column.
    pub r2c_z: R2cPlan<T>,

    /// Complex-to-real along z.
    pub c2r_z: C2rPlan<T>,

    /// Forward along y, one row per local column over (x, z).
    pub forward_y: C2cPlan<T>,

    /// Backward along y.
    pub backward_y: C2cPlan<T>,

    /// Forward along x, one row per local column over (y, z).
    pub forward_x: C2cPlan<T>,

    /// Backward along x.
    pub backward_x: C2cPlan<T>,
}

/// Distributed transform partitioned into columns.
pub struct ColumnFft<T: PmScalar> {
    /// Layouts visited.
    pub plan: ColumnPlan,

    /// Rank the transform was planned on.
    pub rank: usize,

    /// Local transforms.
    pub plans: ColumnPlans<T>,

    /// XY columns to columns over (x, z).
    pub first: Transition,

    /// Columns over (x, z) to columns over (y, z).
    pub second: Transition,
}
