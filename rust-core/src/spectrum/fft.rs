//! FFT engine using realfft for real-valued signals
//!
//! All buffers, including the FFT scratch space, are allocated up front so
//! the transform can run on the audio thread.

use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("FFT failed: {0}")]
    Fft(String),
}

impl From<realfft::FftError> for AnalysisError {
    fn from(err: realfft::FftError) -> Self {
        AnalysisError::Fft(err.to_string())
    }
}

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer (realfft clobbers its input)
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f64>>,

    /// Scratch space so `process` never allocates
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
            scratch,
        }
    }

    /// Forward transform of `signal`, zero-padded or truncated to `fft_size`
    ///
    /// # Returns
    /// Complex spectrum X[k] for k = 0..fft_size/2
    pub fn process(&mut self, signal: &[f64]) -> Result<&[Complex<f64>], AnalysisError> {
        let copy_len = signal.len().min(self.fft_size);
        self.input_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        self.input_buffer[copy_len..].fill(0.0);

        self.r2c.process_with_scratch(
            &mut self.input_buffer,
            &mut self.output_buffer,
            &mut self.scratch,
        )?;

        Ok(&self.output_buffer)
    }

    /// Magnitude spectrum |X[k]| written into `magnitude` (num_bins long)
    pub fn magnitude_into(
        &mut self,
        signal: &[f64],
        magnitude: &mut [f64],
    ) -> Result<(), AnalysisError> {
        let spectrum = self.process(signal)?;
        for (out, c) in magnitude.iter_mut().zip(spectrum) {
            *out = c.norm();
        }
        Ok(())
    }

    /// Compute FFT and return magnitude spectrum (allocates)
    pub fn compute_magnitude(&mut self, signal: &[f64]) -> Result<Vec<f64>, AnalysisError> {
        let mut magnitude = vec![0.0; self.num_bins()];
        self.magnitude_into(signal, &mut magnitude)?;
        Ok(magnitude)
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Bin center frequency in Hz: k * sample_rate / fft_size
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }

    /// Convert bin index to normalized frequency (units of π rad/sample)
    pub fn bin_to_frequency(&self, bin: usize) -> f64 {
        2.0 * bin as f64 / self.fft_size as f64
    }
}
