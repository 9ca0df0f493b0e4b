//! Traits that are useful across modules
use bytemuck::Pod;
use num::Float;
use num_complex::Complex;
use rustfft::FftNum;

/// Floating point types supported by the transforms and the mesh pipeline.
///
/// Grid buffers are stored as reals with a padded last dimension, so that after a real-to-complex
/// transform the same memory can be viewed as interleaved complex numbers.
pub trait PmScalar: FftNum + Float + Pod + Default {
    /// Convert a double precision constant into this type.
    fn cast(value: f64) -> Self;

    /// Widen to double precision, used for global reductions.
    fn widen(self) -> f64;

    /// Maximum absolute error expected from a forward and backward transform of data of order unity.
    fn round_trip_tolerance() -> f64;

    /// View a real buffer of even length as complex numbers.
    fn as_complex(data: &[Self]) -> &[Complex<Self>];

    /// Mutably view a real buffer of even length as complex numbers.
    fn as_complex_mut(data: &mut [Self]) -> &mut [Complex<Self>];
}

impl PmScalar for f32 {
    fn cast(value: f64) -> Self {
        value as f32
    }

    fn widen(self) -> f64 {
        self as f64
    }

    fn round_trip_tolerance() -> f64 {
        1e-3
    }

    fn as_complex(data: &[Self]) -> &[Complex<Self>] {
        bytemuck::cast_slice(data)
    }

    fn as_complex_mut(data: &mut [Self]) -> &mut [Complex<Self>] {
        bytemuck::cast_slice_mut(data)
    }
}

impl PmScalar for f64 {
    fn cast(value: f64) -> Self {
        value
    }

    fn widen(self) -> f64 {
        self
    }

    fn round_trip_tolerance() -> f64 {
        1e-5
    }

    fn as_complex(data: &[Self]) -> &[Complex<Self>] {
        bytemuck::cast_slice(data)
    }

    fn as_complex_mut(data: &mut [Self]) -> &mut [Complex<Self>] {
        bytemuck::cast_slice_mut(data)
    }
}

/// Integer types used to address cells of the global grid in point-to-point mesh exchanges.
///
/// Grids whose volume fits in 32 bits use the narrow type, larger grids are widened to 64 bits.
pub trait GridIndex: Pod + Ord + Send + Sync + std::fmt::Debug {
    /// Largest grid volume this type can address.
    const MAX_VOLUME: usize;

    /// Narrow a flat cell index.
    fn from_usize(index: usize) -> Self;

    /// Widen to a flat cell index.
    fn to_usize(self) -> usize;
}

impl GridIndex for u32 {
    const MAX_VOLUME: usize = u32::MAX as usize;

    fn from_usize(index: usize) -> Self {
        index as u32
    }

    fn to_usize(self) -> usize {
        self as usize
    }
}

impl GridIndex for u64 {
    const MAX_VOLUME: usize = usize::MAX;

    fn from_usize(index: usize) -> Self {
        index as u64
    }

    fn to_usize(self) -> usize {
        self as usize
    }
}
