//! # Real to Complex Transform
use std::sync::Arc;

use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::{
    fft::{
        helpers::{validate_buffer, validate_plan},
        types::{FftError, ShapeInfo},
    },
    traits::general::PmScalar,
};

/// Plan for a batch of in place real-to-complex transforms over padded rows.
///
/// Each row holds `len` real values followed by padding up to `2 * (len / 2 + 1)`; after
/// execution the row holds the `len / 2 + 1` complex coefficients of the half spectrum.
#[derive(Clone)]
pub struct R2cPlan<T: PmScalar> {
    fft: Arc<dyn RealToComplex<T>>,

    /// Lengths of the real and complex sequences.
    pub shape: ShapeInfo,

    /// Number of rows per execution.
    pub count: usize,
}

/// Plan for a batch of in place complex-to-real transforms over padded rows.
///
/// The inverse of [`R2cPlan`] up to a factor of `len`. The imaginary parts of the zero and (for
/// even lengths) Nyquist coefficients are discarded, as they carry no information for real data.
#[derive(Clone)]
pub struct C2rPlan<T: PmScalar> {
    fft: Arc<dyn ComplexToReal<T>>,

    /// Lengths of the real and complex sequences.
    pub shape: ShapeInfo,

    /// Number of rows per execution.
    pub count: usize,
}

impl<T: PmScalar> R2cPlan<T> {
    /// Constructor
    ///
    /// # Arguments
    /// * `len` - Length of each real row.
    /// * `count` - Number of rows per execution.
    pub fn new(len: usize, count: usize) -> Result<Self, FftError> {
        validate_plan(len, count, 1)?;
        let mut planner = RealFftPlanner::<T>::new();
        Ok(Self {
            fft: planner.plan_fft_forward(len),
            shape: ShapeInfo::new(len),
            count,
        })
    }

    /// Execute the batch in place.
    ///
    /// # Arguments
    /// * `buffer` - Padded rows, at least `count * 2 * (len / 2 + 1)` values.
    pub fn execute(&self, buffer: &mut [T]) -> Result<(), FftError> {
        let row_stride = self.shape.row_stride();
        let n = self.shape.n_input;
        validate_buffer(buffer.len(), self.count * row_stride)?;

        buffer
            .par_chunks_exact_mut(row_stride)
            .take(self.count)
            .try_for_each_init(
                || (self.fft.make_input_vec(), self.fft.make_scratch_vec()),
                |(input, scratch), row| {
                    input.copy_from_slice(&row[..n]);
                    self.fft
                        .process_with_scratch(input, T::as_complex_mut(row), scratch)
                        .map_err(|e| FftError::InvalidDimension(e.to_string()))
                },
            )
    }
}

impl<T: PmScalar> C2rPlan<T> {
    /// Constructor
    ///
    /// # Arguments
    /// * `len` - Length of each real row.
    /// * `count` - Number of rows per execution.
    pub fn new(len: usize, count: usize) -> Result<Self, FftError> {
        validate_plan(len, count, 1)?;
        let mut planner = RealFftPlanner::<T>::new();
        Ok(Self {
            fft: planner.plan_fft_inverse(len),
            shape: ShapeInfo::new(len),
            count,
        })
    }

    /// Execute the batch in place.
    ///
    /// # Arguments
    /// * `buffer` - Padded rows holding half spectra, at least `count * 2 * (len / 2 + 1)` values.
    pub fn execute(&self, buffer: &mut [T]) -> Result<(), FftError> {
        let row_stride = self.shape.row_stride();
        let n = self.shape.n_input;
        let nc = self.shape.n_output;
        validate_buffer(buffer.len(), self.count * row_stride)?;

        buffer
            .par_chunks_exact_mut(row_stride)
            .take(self.count)
            .try_for_each_init(
                || {
                    (
                        self.fft.make_input_vec(),
                        self.fft.make_output_vec(),
                        self.fft.make_scratch_vec(),
                    )
                },
                |(input, output, scratch), row| {
                    input.copy_from_slice(&T::as_complex(row)[..nc]);
                    input[0].im = T::zero();
                    if n % 2 == 0 {
                        input[nc - 1].im = T::zero();
                    }

                    self.fft
                        .process_with_scratch(input, output, scratch)
                        .map_err(|e| FftError::InvalidDimension(e.to_string()))?;

                    row[..n].copy_from_slice(output);
                    row[n..].iter_mut().for_each(|v| *v = T::zero());
                    Ok(())
                },
            )
    }
}
