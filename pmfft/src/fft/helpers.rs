//! Helper functions
use crate::fft::types::FftError;

/// Validate the geometry of a batched plan.
///
/// # Arguments
/// * `len` - Length of each transform.
/// * `howmany` - Number of transforms in the batch.
/// * `stride` - Distance between consecutive elements of one transform.
pub fn validate_plan(len: usize, howmany: usize, stride: usize) -> Result<(), FftError> {
    if len == 0 {
        return Err(FftError::InvalidPlan(
            "transform length must be positive".to_string(),
        ));
    }
    if stride == 0 {
        return Err(FftError::InvalidPlan("stride must be positive".to_string()));
    }
    if howmany == 0 {
        return Err(FftError::InvalidPlan(
            "batch must contain at least one transform".to_string(),
        ));
    }
    Ok(())
}

/// Index one past the last element touched by a strided batch.
///
/// # Arguments
/// * `len` - Length of each transform.
/// * `howmany` - Number of transforms in the batch.
/// * `stride` - Distance between consecutive elements of one transform.
/// * `dist` - Distance between the first elements of consecutive transforms.
pub fn batch_extent(len: usize, howmany: usize, stride: usize, dist: usize) -> usize {
    (howmany - 1) * dist + (len - 1) * stride + 1
}

/// Validate that a buffer covers a batch.
///
/// # Arguments
/// * `buffer_len` - Length of the buffer handed to a plan.
/// * `required` - Length required by the plan.
pub fn validate_buffer(buffer_len: usize, required: usize) -> Result<(), FftError> {
    if buffer_len < required {
        Err(FftError::InvalidDimension(format!(
            "buffer of length {} is shorter than the {} values the plan addresses",
            buffer_len, required
        )))
    } else {
        Ok(())
    }
}
