//! Cloud-in-cell assignment stencil, shared by every deposit and read-out.
use crate::{
    pm::types::{MeshGeometry, Particles},
    traits::{general::PmScalar, types::PmError},
};

/// The eight cells a particle contributes to, and the weight of each.
///
/// Corner `c` uses the upper neighbour along x when bit 2 of `c` is set, along y for bit 1 and
/// along z for bit 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stencil {
    /// Canonical coordinates of each corner cell on the transform grid.
    pub cells: [[usize; 3]; 8],

    /// Trilinear weight of each corner, summing to one.
    pub weights: [f64; 8],
}

/// Cloud-in-cell stencil of a particle.
///
/// A position `p` along axis `a` falls at `u = p * mesh[a]` in cell units; the particle
/// contributes `1 - f` to cell `floor(u)` and `f` to the next cell, where `f = u - floor(u)`.
/// Indices wrap around the transform grid.
///
/// # Arguments
/// * `position` - Position as fractions of the domain extent, three values.
/// * `geometry` - Mesh geometry.
pub fn stencil<T: PmScalar>(position: &[T], geometry: &MeshGeometry) -> Stencil {
    let grid = geometry.grid.shape();
    let mut lower = [0usize; 3];
    let mut upper = [0usize; 3];
    let mut frac = [0f64; 3];

    for a in 0..3 {
        let u = position[a].widen() * geometry.mesh[a] as f64;
        let i = u.floor();
        frac[a] = u - i;
        lower[a] = (i as i64).rem_euclid(grid[a] as i64) as usize;
        upper[a] = (lower[a] + 1) % grid[a];
    }

    let mut cells = [[0usize; 3]; 8];
    let mut weights = [0f64; 8];
    for c in 0..8 {
        let mut w = 1.0;
        for a in 0..3 {
            if (c >> (2 - a)) & 1 == 1 {
                cells[c][a] = upper[a];
                w *= frac[a];
            } else {
                cells[c][a] = lower[a];
                w *= 1.0 - frac[a];
            }
        }
        weights[c] = w;
    }

    Stencil { cells, weights }
}

impl<'a, T: PmScalar> Particles<'a, T> {
    /// Wrap caller owned particle data.
    ///
    /// # Arguments
    /// * `positions` - Interleaved positions, three per particle.
    /// * `masses` - One mass per particle.
    pub fn new(positions: &'a [T], masses: &'a [T]) -> Result<Self, PmError> {
        if positions.len() != 3 * masses.len() {
            return Err(PmError::InvalidInput(format!(
                "{} position values do not describe {} particles",
                positions.len(),
                masses.len()
            )));
        }
        Ok(Self { positions, masses })
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.masses.len()
    }

    /// Whether there are no particles.
    pub fn is_empty(&self) -> bool {
        self.masses.is_empty()
    }

    /// Position of particle `i`.
    pub fn position(&self, i: usize) -> &'a [T] {
        &self.positions[3 * i..3 * i + 3]
    }

    /// Local total mass.
    pub fn total_mass(&self) -> f64 {
        self.masses.iter().map(|m| m.widen()).sum()
    }
}
