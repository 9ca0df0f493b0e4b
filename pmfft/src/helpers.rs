//! Helper functions used across modules, and fixtures for tests and benchmarks.
use bytemuck::Pod;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{
    decomposition::Layout,
    traits::{general::PmScalar, types::PmError},
};

/// Allocate a zero initialised buffer, reporting failure instead of aborting.
///
/// # Arguments
/// * `len` - Number of elements.
pub fn try_zeroed<E: Pod>(len: usize) -> Result<Vec<E>, PmError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        PmError::Allocation(format!(
            "could not reserve {} elements of {} bytes: {}",
            len,
            std::mem::size_of::<E>(),
            e
        ))
    })?;
    buffer.resize(len, E::zeroed());
    Ok(buffer)
}

/// Uniformly distributed particles in the unit cube, with unit total mass.
///
/// Returns interleaved positions `[x0, y0, z0, x1, ...]` and masses.
///
/// # Arguments
/// * `n_particles` - Number of particles.
/// * `seed` - Random seed, defaults to 0.
pub fn particles_fixture<T: PmScalar>(n_particles: usize, seed: Option<u64>) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(0));
    let between = Uniform::from(0.0..1.0);

    let positions = (0..3 * n_particles)
        .map(|_| T::cast(between.sample(&mut rng)))
        .collect();
    let masses = vec![T::cast(1.0 / n_particles as f64); n_particles];

    (positions, masses)
}

/// Particles concentrated in a small cube, the regime where only a few processes own mesh
/// cells touched by particles.
///
/// # Arguments
/// * `n_particles` - Number of particles.
/// * `centre` - Centre of the cluster, in the unit cube.
/// * `width` - Edge length of the cluster.
/// * `seed` - Random seed, defaults to 0.
pub fn clustered_particles_fixture<T: PmScalar>(
    n_particles: usize,
    centre: [f64; 3],
    width: f64,
    seed: Option<u64>,
) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed.unwrap_or(0));
    let between = Uniform::from(-0.5..0.5);

    let positions = (0..n_particles)
        .flat_map(|_| {
            let offsets = [
                between.sample(&mut rng),
                between.sample(&mut rng),
                between.sample(&mut rng),
            ];
            (0..3).map(move |a| T::cast((centre[a] + width * offsets[a]).rem_euclid(1.0)))
        })
        .collect();

    // Unequal masses
    let masses = (0..n_particles)
        .map(|i| T::cast((1 + i % 3) as f64 / (2 * n_particles) as f64))
        .collect();

    (positions, masses)
}

/// Check a transform buffer against the length a plan requires, returning the part in use.
///
/// # Arguments
/// * `data` - Caller supplied buffer.
/// * `fftsize` - Required length.
pub fn fft_buffer<T>(data: &mut [T], fftsize: usize) -> Result<&mut [T], PmError> {
    if data.len() < fftsize {
        return Err(PmError::InvalidInput(format!(
            "transform buffer of length {} is shorter than fftsize {}",
            data.len(),
            fftsize
        )));
    }
    Ok(&mut data[..fftsize])
}

/// Local part of a real field defined cell by cell, stored in `layout` with zero padding.
///
/// # Arguments
/// * `layout` - Real layout of the field.
/// * `rank` - Rank whose part is built.
/// * `len` - Length of the returned buffer, at least the local length of `layout`.
/// * `f` - Value of the field at a cell given in canonical coordinates.
pub fn field_fixture<T: PmScalar>(
    layout: &Layout,
    rank: usize,
    len: usize,
    f: impl Fn([usize; 3]) -> f64,
) -> Vec<T> {
    let mut data = vec![T::zero(); len.max(layout.local_len(rank))];
    for column in layout.local_columns(rank) {
        for position in 0..layout.dims[2] {
            let cell = layout.cell_of(column, position);
            data[layout.local_offset(rank, cell)] = T::cast(f(cell));
        }
    }
    data
}
