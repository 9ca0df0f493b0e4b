//! Utility types for trait definitions.
use std::fmt;

use crate::fft::types::FftError;

/// Type to handle particle-mesh and distributed transform errors.
///
/// Every variant is fatal for a run: the collective operations that produce them leave the
/// distributed grid in a state that cannot be resumed, so callers are expected to propagate
/// rather than retry.
#[derive(Debug)]
pub enum PmError {
    /// The grid, stretch factors or process count are unsupported by the chosen strategy.
    Configuration(String),

    /// A buffer required by a plan or an evaluation could not be reserved.
    Allocation(String),

    /// A collective exchange did not complete consistently on all processes.
    Communication(String),

    /// Grid addressing does not fit the widest available index type.
    IndexRange(String),

    /// Caller supplied data of inconsistent shape.
    InvalidInput(String),

    /// Failure of a local one dimensional transform.
    Fft(FftError),
}

impl fmt::Display for PmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmError::Configuration(e) => write!(f, "Configuration error: {}", e),
            PmError::Allocation(e) => write!(f, "Allocation error: {}", e),
            PmError::Communication(e) => write!(f, "Communication error: {}", e),
            PmError::IndexRange(e) => write!(f, "Index range error: {}", e),
            PmError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            PmError::Fft(e) => write!(f, "FFT error: {}", e),
        }
    }
}

impl std::error::Error for PmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PmError::Fft(e) => Some(e),
            PmError::Configuration(_e) => None,
            PmError::Allocation(_e) => None,
            PmError::Communication(_e) => None,
            PmError::IndexRange(_e) => None,
            PmError::InvalidInput(_e) => None,
        }
    }
}

impl From<FftError> for PmError {
    fn from(e: FftError) -> Self {
        PmError::Fft(e)
    }
}
