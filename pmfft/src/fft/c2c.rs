//! # Complex to Complex Transform
use std::sync::Arc;

use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::{
    fft::{
        helpers::{batch_extent, validate_buffer, validate_plan},
        types::{FftError, Sign},
    },
    traits::general::PmScalar,
};

/// Plan for a batch of complex-to-complex transforms of fixed length.
///
/// Transform `t` of the batch acts on the elements `t * dist + i * stride` for `i` in `0..len`,
/// mirroring the advanced interface of common FFT libraries.
#[derive(Clone)]
pub struct C2cPlan<T: PmScalar> {
    fft: Arc<dyn Fft<T>>,

    /// Direction of the transform.
    pub sign: Sign,

    /// Length of each transform.
    pub len: usize,

    /// Number of transforms per execution.
    pub howmany: usize,

    /// Distance between consecutive elements of one transform.
    pub stride: usize,

    /// Distance between the first elements of consecutive transforms.
    pub dist: usize,
}

impl<T: PmScalar> C2cPlan<T> {
    /// Constructor
    ///
    /// # Arguments
    /// * `sign` - Direction of the transform.
    /// * `len` - Length of each transform.
    /// * `howmany` - Number of transforms per execution.
    /// * `stride` - Distance between consecutive elements of one transform.
    /// * `dist` - Distance between the first elements of consecutive transforms.
    pub fn new(
        sign: Sign,
        len: usize,
        howmany: usize,
        stride: usize,
        dist: usize,
    ) -> Result<Self, FftError> {
        validate_plan(len, howmany, stride)?;
        if howmany > 1 && dist == 0 {
            return Err(FftError::InvalidPlan(
                "transforms of a batch must not alias".to_string(),
            ));
        }

        let mut planner = FftPlanner::<T>::new();
        let fft = planner.plan_fft(len, sign.into());

        Ok(Self {
            fft,
            sign,
            len,
            howmany,
            stride,
            dist,
        })
    }

    /// Length of buffer the plan addresses.
    pub fn extent(&self) -> usize {
        batch_extent(self.len, self.howmany, self.stride, self.dist)
    }

    /// Execute the batch in place.
    ///
    /// # Arguments
    /// * `buffer` - Data, at least [`C2cPlan::extent`] long.
    pub fn execute(&self, buffer: &mut [Complex<T>]) -> Result<(), FftError> {
        validate_buffer(buffer.len(), self.extent())?;
        let scratch_len = self.fft.get_inplace_scratch_len();
        let len = self.len;

        if self.stride == 1 && self.dist >= len {
            // Contiguous transforms, run directly on the buffer
            buffer
                .par_chunks_mut(self.dist)
                .take(self.howmany)
                .for_each_init(
                    || vec![Complex::<T>::default(); scratch_len],
                    |scratch, chunk| self.fft.process_with_scratch(&mut chunk[..len], scratch),
                );
        } else {
            // Gather strided lines, transform, scatter back
            let mut lines = vec![Complex::<T>::default(); len * self.howmany];
            let source = &*buffer;
            lines.par_chunks_exact_mut(len).enumerate().for_each_init(
                || vec![Complex::<T>::default(); scratch_len],
                |scratch, (t, line)| {
                    let start = t * self.dist;
                    for (i, value) in line.iter_mut().enumerate() {
                        *value = source[start + i * self.stride];
                    }
                    self.fft.process_with_scratch(line, scratch);
                },
            );

            for (t, line) in lines.chunks_exact(len).enumerate() {
                let start = t * self.dist;
                for (i, &value) in line.iter().enumerate() {
                    buffer[start + i * self.stride] = value;
                }
            }
        }

        Ok(())
    }
}
