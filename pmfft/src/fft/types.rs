//! # Local Transform Types
use std::fmt;

use rustfft::FftDirection;

/// Information about the length of input and output sequences in real-to-complex DFTs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeInfo {
    /// Length of the real sequence.
    pub n_input: usize,

    /// Number of complex values in the half spectrum, `n_input / 2 + 1`.
    pub n_output: usize,
}

impl ShapeInfo {
    /// Shape of a real transform of length `n`.
    pub fn new(n: usize) -> Self {
        Self {
            n_input: n,
            n_output: n / 2 + 1,
        }
    }

    /// Number of real values a padded row occupies.
    pub fn row_stride(&self) -> usize {
        2 * self.n_output
    }
}

/// Error type for local transforms, arising from plans with invalid geometry and from buffers of
/// incorrect dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    /// The requested plan geometry cannot be transformed.
    InvalidPlan(String),

    /// A buffer is too short for the batch the plan was created for.
    InvalidDimension(String),
}

impl fmt::Display for FftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FftError::InvalidPlan(e) => write!(f, "Invalid plan: {}", e),
            FftError::InvalidDimension(e) => write!(f, "Invalid dimension: {}", e),
        }
    }
}

impl std::error::Error for FftError {}

/// Direction of complex-to-complex transform
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Forward transform, kernel `exp(-2 pi i jk / n)`
    Forward = -1,

    /// Backward transform, kernel `exp(+2 pi i jk / n)`
    Backward = 1,
}

impl From<Sign> for FftDirection {
    fn from(sign: Sign) -> Self {
        match sign {
            Sign::Forward => FftDirection::Forward,
            Sign::Backward => FftDirection::Inverse,
        }
    }
}
