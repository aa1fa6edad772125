//! FFT-based fast convolution for long FIR filters
//!
//! Overlap-save over the convolution engine's own delay line: each pass
//! transforms the newest `fft_size` history samples, multiplies by the
//! filter spectrum and keeps the tail of the inverse transform. Output is
//! sample-exact with direct form and adds no latency.

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::fmt;
use std::sync::Arc;

/// Filters longer than this use the FFT path
pub const DIRECT_FORM_MAX_TAPS: usize = 128;

/// Largest chunk one pass handles when no block size is given
pub const DEFAULT_MAX_BLOCK: usize = 1024;

/// Frequency-domain kernel with all working buffers preallocated
pub struct FastConvolver {
    /// FFT size, a power of two >= taps - 1 + max_block
    fft_size: usize,

    /// Longest chunk a single pass can produce exactly
    max_block: usize,

    /// Filter spectrum H[k], taps zero-padded to `fft_size`
    h_fft: Vec<Complex<f64>>,

    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,

    /// Unrolled history frame, oldest first (clobbered by the forward FFT)
    frame: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    output: Vec<f64>,
    forward_scratch: Vec<Complex<f64>>,
    inverse_scratch: Vec<Complex<f64>>,
}

impl FastConvolver {
    /// Plan transforms for `taps` and chunks of up to `max_block` samples
    ///
    /// Allocates; call on the control thread.
    pub fn new(taps: &[f64], max_block: usize) -> Self {
        let max_block = max_block.max(1);
        let fft_size = (taps.len().saturating_sub(1) + max_block).next_power_of_two();

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let mut padded = r2c.make_input_vec();
        padded[..taps.len()].copy_from_slice(taps);
        let mut h_fft = r2c.make_output_vec();
        let mut forward_scratch = r2c.make_scratch_vec();
        // Sizes come from the plan itself, so the transform cannot fail
        if r2c
            .process_with_scratch(&mut padded, &mut h_fft, &mut forward_scratch)
            .is_err()
        {
            h_fft.fill(Complex::new(0.0, 0.0));
        }

        // Fold the inverse FFT normalization into the kernel
        let scale = 1.0 / fft_size as f64;
        for h in h_fft.iter_mut() {
            *h *= scale;
        }

        Self {
            fft_size,
            max_block,
            h_fft,
            frame: r2c.make_input_vec(),
            spectrum: r2c.make_output_vec(),
            output: c2r.make_output_vec(),
            inverse_scratch: c2r.make_scratch_vec(),
            forward_scratch,
            r2c,
            c2r,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Filter the newest `out.len()` samples of a circular history
    ///
    /// `history[cursor]` is the most recent sample and the history must hold
    /// at least `fft_size` samples; `out.len()` must not exceed `max_block`.
    /// Returns false if a transform failed, leaving `out` untouched.
    pub fn process(&mut self, history: &[f64], cursor: usize, out: &mut [f64]) -> bool {
        let m = self.fft_size;
        let len = history.len();
        debug_assert!(len >= m && out.len() <= self.max_block);

        // Oldest sample of the frame, then two contiguous runs
        let start = (cursor + 1 + len - m) % len;
        let first = m.min(len - start);
        self.frame[..first].copy_from_slice(&history[start..start + first]);
        self.frame[first..].copy_from_slice(&history[..m - first]);

        if self
            .r2c
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.forward_scratch)
            .is_err()
        {
            return false;
        }

        for (x, h) in self.spectrum.iter_mut().zip(&self.h_fft) {
            *x *= h;
        }
        // DC and Nyquist bins of a real signal carry no imaginary part
        let last = self.spectrum.len() - 1;
        self.spectrum[0].im = 0.0;
        self.spectrum[last].im = 0.0;

        if self
            .c2r
            .process_with_scratch(&mut self.spectrum, &mut self.output, &mut self.inverse_scratch)
            .is_err()
        {
            return false;
        }

        // The first taps - 1 outputs alias; the tail is exact
        out.copy_from_slice(&self.output[m - out.len()..]);
        true
    }
}

impl fmt::Debug for FastConvolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastConvolver")
            .field("fft_size", &self.fft_size)
            .field("max_block", &self.max_block)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Circular history holding `signal` with the last sample at `cursor`
    fn history_of(signal: &[f64], capacity: usize, cursor: usize) -> Vec<f64> {
        let mut history = vec![0.0; capacity];
        for (age, &x) in signal.iter().rev().take(capacity).enumerate() {
            history[(cursor + capacity - age) % capacity] = x;
        }
        history
    }

    fn direct(taps: &[f64], signal: &[f64], n: usize) -> f64 {
        taps.iter()
            .enumerate()
            .filter(|(k, _)| *k <= n)
            .map(|(k, h)| h * signal[n - k])
            .sum()
    }

    #[test]
    fn test_fft_size_covers_filter_and_block() {
        let fast = FastConvolver::new(&[0.0; 161], 256);
        assert_eq!(fast.fft_size(), 512);
        assert_eq!(fast.max_block(), 256);

        let fast = FastConvolver::new(&[0.0; 6001], 1024);
        assert_eq!(fast.fft_size(), 8192);
    }

    #[test]
    fn test_fast_fir_impulse() {
        let taps: Vec<f64> = (0..200).map(|i| ((i * 13) % 17) as f64 / 17.0 - 0.5).collect();
        let mut fast = FastConvolver::new(&taps, 256);

        // Impulse 199 samples ago, followed by silence
        let mut signal = vec![0.0; 256];
        signal[56] = 1.0;
        let history = history_of(&signal, fast.fft_size(), 37);

        let mut out = vec![0.0; 256];
        assert!(fast.process(&history, 37, &mut out));
        for (i, &y) in out.iter().enumerate() {
            let expected = if i >= 56 { taps[i - 56] } else { 0.0 };
            assert!((y - expected).abs() < 1e-10, "sample {}: {} vs {}", i, y, expected);
        }
    }

    #[test]
    fn test_fast_fir_vs_direct() {
        let taps: Vec<f64> = (0..301).map(|i| (i as f64 * 0.37).cos() / 30.0).collect();
        let signal: Vec<f64> = (0..2000).map(|i| (i as f64 * 0.01).sin() + 0.1).collect();
        let mut fast = FastConvolver::new(&taps, 128);

        // Wrap the frame across the end of a larger history
        let capacity = fast.fft_size() + 77;
        let history = history_of(&signal, capacity, 5);

        let mut out = vec![0.0; 100];
        assert!(fast.process(&history, 5, &mut out));
        for (i, &y) in out.iter().enumerate() {
            let want = direct(&taps, &signal, signal.len() - 100 + i);
            assert!((y - want).abs() < 1e-9, "sample {}: {} vs {}", i, y, want);
        }
    }
}
