//! Streaming spectrum analyzer
//!
//! Keeps a rolling frame of the most recent `fft_size` samples. Each call
//! to [`SpectralAnalyzer::process`] windows that frame, transforms it and
//! appends the dB spectrum to the waterfall. Everything is allocated in
//! [`SpectralAnalyzer::new`], so the per-block path is allocation-free.

use super::fft::{AnalysisError, FftEngine};
use super::waterfall::WaterfallHistory;
use super::windowing::{amplitude_scale, apply_window_into};
use crate::config::ConfigError;
use crate::filters::windows::{generate_window, WindowType};
use serde::{Deserialize, Serialize};

pub const MIN_FFT_SIZE: usize = 64;
pub const MAX_FFT_SIZE: usize = 8192;

/// Longest spectrum any valid configuration produces
pub const MAX_SPECTRUM_SIZE: usize = MAX_FFT_SIZE / 2 + 1;

/// Magnitudes below this are clamped
pub const DB_FLOOR: f64 = -120.0;

/// Spectrum analyzer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// FFT size (power of two)
    pub fft_size: usize,

    /// Window type for spectral analysis
    pub window: WindowType,

    /// Report single-sided amplitude instead of raw |X[k]|
    pub apply_correction: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            window: WindowType::Hamming,
            apply_correction: true,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(ConfigError::Invalid(format!(
                "FFT size must be a power of two in {}..={}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, self.fft_size
            )));
        }
        Ok(())
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

/// Real-time spectrum analyzer
pub struct SpectralAnalyzer {
    config: AnalysisConfig,
    sample_rate: f64,
    fft_engine: FftEngine,

    /// Precomputed analysis window
    window: Vec<f64>,

    /// Interior-bin amplitude scale, 1.0 when correction is off
    scale: f64,

    /// Circular frame of the latest `fft_size` samples
    frame: Vec<f64>,

    /// Next write position in `frame`, which is also the oldest sample
    frame_pos: usize,

    /// Frame unrolled oldest to newest and windowed
    windowed: Vec<f64>,

    magnitude_db: Vec<f64>,
    frequencies: Vec<f64>,
    waterfall: WaterfallHistory,
}

impl SpectralAnalyzer {
    /// Create an analyzer; `config` must already be validated
    pub fn new(config: AnalysisConfig, sample_rate: f64) -> Self {
        let fft_size = config.fft_size;
        let fft_engine = FftEngine::new(fft_size);
        let num_bins = fft_engine.num_bins();

        let window = generate_window(config.window, fft_size);
        let scale = if config.apply_correction {
            amplitude_scale(&window)
        } else {
            1.0
        };

        let frequencies = (0..num_bins)
            .map(|k| fft_engine.bin_to_hz(k, sample_rate))
            .collect();

        Self {
            config,
            sample_rate,
            fft_engine,
            window,
            scale,
            frame: vec![0.0; fft_size],
            frame_pos: 0,
            windowed: vec![0.0; fft_size],
            magnitude_db: vec![DB_FLOOR; num_bins],
            frequencies,
            waterfall: WaterfallHistory::new(num_bins),
        }
    }

    /// Feed new samples into the rolling frame
    pub fn push_samples(&mut self, samples: &[f64]) {
        let size = self.frame.len();
        // Only the newest `size` samples can matter
        let samples = &samples[samples.len().saturating_sub(size)..];

        let first = samples.len().min(size - self.frame_pos);
        self.frame[self.frame_pos..self.frame_pos + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        self.frame[..rest].copy_from_slice(&samples[first..]);

        self.frame_pos = (self.frame_pos + samples.len()) % size;
    }

    /// Spectrum of the current frame; also appends a waterfall row
    pub fn process(&mut self) -> Result<(), AnalysisError> {
        let split = self.frame.len() - self.frame_pos;
        // frame[pos..] holds the oldest samples, frame[..pos] the newest
        let (newest, oldest) = self.frame.split_at(self.frame_pos);
        apply_window_into(oldest, &self.window[..split], &mut self.windowed[..split]);
        apply_window_into(newest, &self.window[split..], &mut self.windowed[split..]);

        self.fft_engine
            .magnitude_into(&self.windowed, &mut self.magnitude_db)?;

        let last = self.magnitude_db.len() - 1;
        for (k, value) in self.magnitude_db.iter_mut().enumerate() {
            let mut magnitude = *value * self.scale;
            if self.config.apply_correction && (k == 0 || k == last) {
                // DC and Nyquist have no negative-frequency twin
                magnitude *= 0.5;
            }
            *value = to_db(magnitude);
        }

        self.waterfall.push(&self.magnitude_db);
        Ok(())
    }

    /// Push `samples` and process, returning (frequencies, magnitude_db)
    pub fn analyze(&mut self, samples: &[f64]) -> Result<(&[f64], &[f64]), AnalysisError> {
        self.push_samples(samples);
        self.process()?;
        Ok((&self.frequencies, &self.magnitude_db))
    }

    /// Zero the frame, spectrum and waterfall
    pub fn reset(&mut self) {
        self.frame.fill(0.0);
        self.frame_pos = 0;
        self.magnitude_db.fill(DB_FLOOR);
        self.waterfall.clear();
    }

    /// Latest spectrum in dB
    pub fn magnitude_db(&self) -> &[f64] {
        &self.magnitude_db
    }

    /// Bin frequencies in Hz, 0 to sample_rate/2
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn waterfall(&self) -> &WaterfallHistory {
        &self.waterfall
    }

    pub fn clear_waterfall(&mut self) {
        self.waterfall.clear();
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_bins(&self) -> usize {
        self.fft_engine.num_bins()
    }
}

#[inline]
fn to_db(magnitude: f64) -> f64 {
    (20.0 * magnitude.max(1e-12).log10()).max(DB_FLOOR)
}
