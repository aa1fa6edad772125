//! Real-time FIR convolution with hot-swappable coefficients
//!
//! Direct-form convolution over a circular history buffer, switching to
//! FFT overlap-save over the same history for long filters. Coefficient
//! sets are swapped only between blocks, and anything that needs allocating
//! (taps, FFT plans, a larger history) is prepared on the control thread.

use super::design::FilterCoefficients;
use super::fast_fir::{FastConvolver, DEFAULT_MAX_BLOCK, DIRECT_FORM_MAX_TAPS};
use std::sync::Arc;

/// Coefficients plus whatever the audio thread needs to adopt them
/// without allocating
#[derive(Debug)]
pub struct PreparedFilter {
    coefficients: Arc<FilterCoefficients>,

    /// Frequency-domain kernel for filters above the direct-form limit
    fast: Option<FastConvolver>,

    /// Replacement history, present only when the filter outgrows the
    /// engine's current buffer
    history: Option<Vec<f64>>,
}

impl PreparedFilter {
    /// Prepare `coefficients` for an engine whose history holds
    /// `current_capacity` samples and whose blocks are at most `max_block`
    pub fn prepare(
        coefficients: Arc<FilterCoefficients>,
        current_capacity: usize,
        max_block: usize,
    ) -> Self {
        let fast = (coefficients.len() > DIRECT_FORM_MAX_TAPS)
            .then(|| FastConvolver::new(coefficients.taps(), max_block));

        let needed = fast
            .as_ref()
            .map_or(coefficients.len(), |fast| fast.fft_size())
            .max(coefficients.len())
            .max(1);
        let history = if needed > current_capacity {
            Some(vec![0.0; needed])
        } else {
            None
        };

        Self {
            coefficients,
            fast,
            history,
        }
    }

    pub fn coefficients(&self) -> &Arc<FilterCoefficients> {
        &self.coefficients
    }

    /// True when the engine will run this filter through the FFT path
    pub fn uses_fft(&self) -> bool {
        self.fast.is_some()
    }

    /// History capacity the engine will have once this filter is adopted
    pub fn required_capacity(&self, current_capacity: usize) -> usize {
        self.history
            .as_ref()
            .map_or(current_capacity, |history| history.len())
    }
}

/// What the engine gave up in a swap; must be dropped off the audio thread
#[derive(Debug)]
pub struct RetiredKernel {
    pub coefficients: Arc<FilterCoefficients>,
    pub fast: Option<FastConvolver>,
    pub history: Option<Vec<f64>>,
}

/// Real-time FIR convolution engine with zero-allocation processing
pub struct ConvolutionEngine {
    /// Active filter taps h[n]
    coefficients: Arc<FilterCoefficients>,

    /// FFT kernel for the active filter, if it is long
    fast: Option<FastConvolver>,

    /// Circular delay line, at least as long as the longest filter seen
    /// (and the FFT frame when `fast` is set)
    history: Vec<f64>,

    /// Index of the most recent sample in `history`
    cursor: usize,
}

impl ConvolutionEngine {
    /// Create an engine sized for `coefficients`
    pub fn new(coefficients: Arc<FilterCoefficients>) -> Self {
        Self::with_block_size(coefficients, DEFAULT_MAX_BLOCK)
    }

    /// Create an engine whose FFT path handles `max_block` samples per pass
    pub fn with_block_size(coefficients: Arc<FilterCoefficients>, max_block: usize) -> Self {
        let PreparedFilter {
            coefficients,
            fast,
            history,
        } = PreparedFilter::prepare(coefficients, 0, max_block);
        let history = history.unwrap_or_else(|| vec![0.0; 1]);

        Self {
            coefficients,
            fast,
            cursor: history.len() - 1,
            history,
        }
    }

    /// Pass-through engine
    pub fn identity() -> Self {
        Self::new(Arc::new(FilterCoefficients::identity()))
    }

    /// Adopt a prepared filter at a block boundary
    ///
    /// When the prepared filter carries a larger history buffer, the most
    /// recent samples are copied across so the stream stays continuous.
    /// Never allocates; the displaced pieces are returned for reclamation.
    pub fn replace(&mut self, prepared: PreparedFilter) -> RetiredKernel {
        let PreparedFilter {
            coefficients,
            fast,
            history,
        } = prepared;

        let retired_history = history.and_then(|mut grown| {
            if grown.len() <= self.history.len() {
                // Already large enough; hand the spare buffer straight back
                return Some(grown);
            }

            let old_len = self.history.len();
            let offset = grown.len() - old_len;
            // Oldest to newest: start just after the cursor
            for i in 0..old_len {
                grown[offset + i] = self.history[(self.cursor + 1 + i) % old_len];
            }
            grown[..offset].fill(0.0);

            self.cursor = grown.len() - 1;
            Some(std::mem::replace(&mut self.history, grown))
        });

        RetiredKernel {
            coefficients: std::mem::replace(&mut self.coefficients, coefficients),
            fast: std::mem::replace(&mut self.fast, fast),
            history: retired_history,
        }
    }

    #[inline]
    fn push(&mut self, input: f64) {
        self.cursor += 1;
        if self.cursor == self.history.len() {
            self.cursor = 0;
        }
        self.history[self.cursor] = input;
    }

    /// y[n] = Σ h[k] * x[n-k] over the current history
    #[inline]
    fn convolve(&self) -> f64 {
        let taps = self.coefficients.taps();
        let len = self.history.len();
        let direct = (self.cursor + 1).min(taps.len());

        let mut output = 0.0;
        for (k, &coeff) in taps[..direct].iter().enumerate() {
            output += coeff * self.history[self.cursor - k];
        }
        // Wrapped part: index cursor - k + len
        for (k, &coeff) in taps.iter().enumerate().skip(direct) {
            output += coeff * self.history[self.cursor + len - k];
        }
        output
    }

    /// Process single sample (zero-allocation, always direct form)
    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        self.push(input);
        self.convolve()
    }

    /// Process a block of samples into a new vector
    pub fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        let mut output = input.to_vec();
        self.process_block_inplace(&mut output);
        output
    }

    /// Process a block in-place
    ///
    /// Long filters run through the FFT kernel in chunks of at most its
    /// block size; a failed transform falls back to direct form.
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        let Some(mut fast) = self.fast.take() else {
            for sample in buffer.iter_mut() {
                *sample = self.process_sample(*sample);
            }
            return;
        };

        for chunk in buffer.chunks_mut(fast.max_block()) {
            self.push_history(chunk);
            if !fast.process(&self.history, self.cursor, chunk) {
                self.convolve_tail(chunk);
            }
        }
        self.fast = Some(fast);
    }

    /// Direct-form output for the newest `out.len()` samples already in
    /// the history
    fn convolve_tail(&mut self, out: &mut [f64]) {
        let len = self.history.len();
        let count = out.len();
        let newest = self.cursor;
        for (i, sample) in out.iter_mut().enumerate() {
            let age = count - 1 - i;
            self.cursor = (newest + len - age) % len;
            *sample = self.convolve();
        }
        self.cursor = newest;
    }

    /// Advance the delay line without computing output
    ///
    /// Used while bypassed so the filter resumes without a transient.
    pub fn push_history(&mut self, input: &[f64]) {
        for &sample in input {
            self.push(sample);
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.cursor = self.history.len() - 1;
    }

    pub fn coefficients(&self) -> &Arc<FilterCoefficients> {
        &self.coefficients
    }

    /// Active filter length
    pub fn length(&self) -> usize {
        self.coefficients.len()
    }

    /// True while the active filter runs through the FFT path
    pub fn uses_fft(&self) -> bool {
        self.fast.is_some()
    }

    /// Samples the delay line can hold
    pub fn history_capacity(&self) -> usize {
        self.history.len()
    }
}
