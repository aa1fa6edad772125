//! Windowing for spectral analysis
//!
//! Windows are applied to time-domain frames before the FFT to reduce
//! spectral leakage. The correction helpers turn raw |X[k]| into
//! single-sided amplitude.

use crate::filters::windows::{generate_window, WindowType};

/// Apply window to signal
///
/// # Returns
/// Windowed signal
pub fn apply_window(signal: &[f64], window_type: WindowType) -> Vec<f64> {
    let window = generate_window(window_type, signal.len());
    signal.iter().zip(&window).map(|(&s, &w)| s * w).collect()
}

/// Multiply `frame` by a precomputed `window`, writing into `out`
///
/// All three slices must have the same length.
#[inline]
pub fn apply_window_into(frame: &[f64], window: &[f64], out: &mut [f64]) {
    debug_assert_eq!(frame.len(), window.len());
    debug_assert_eq!(out.len(), window.len());
    for ((o, &s), &w) in out.iter_mut().zip(frame).zip(window) {
        *o = s * w;
    }
}

/// Coherent gain: Σw / N
pub fn coherent_gain(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 1.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Scale turning |X[k]| into single-sided amplitude for interior bins
///
/// A unit-amplitude sine centred on a bin then reads 1.0 (0 dB). DC and
/// Nyquist take half this value since they have no mirrored twin.
pub fn amplitude_scale(window: &[f64]) -> f64 {
    let sum: f64 = window.iter().sum();
    if sum <= f64::EPSILON {
        1.0
    } else {
        2.0 / sum
    }
}

/// Calculate window correction factor (N / Σw)
///
/// Multiplying an FFT magnitude by this undoes the window's amplitude loss.
pub fn window_correction_factor(window_type: WindowType, length: usize) -> f64 {
    1.0 / coherent_gain(&generate_window(window_type, length))
}
