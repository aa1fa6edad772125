//! Window functions for FIR filter design and spectral analysis
//!
//! Coefficient tables follow Oppenheim & Schafer, Table 7.2.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    /// Rectangular window (no tapering)
    Rectangular,

    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Mainlobe width: 8π/M, Sidelobe attenuation: ~44 dB
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    /// Mainlobe width: 8π/M, Sidelobe attenuation: ~53 dB
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    /// Mainlobe width: 12π/M, Sidelobe attenuation: ~74 dB
    Blackman,
}

impl WindowType {
    /// All window types, narrowest mainlobe first
    pub const ALL: [WindowType; 4] = [
        WindowType::Rectangular,
        WindowType::Hann,
        WindowType::Hamming,
        WindowType::Blackman,
    ];

    /// Transition factor used for filter sizing, in units of 2π/M
    ///
    /// This is half the mainlobe width, so that
    /// `M = ceil(factor * 2π / Δω)` reproduces the classic `M = Aπ/Δω`
    /// sizing rule (Hamming at Δω = 0.05π gives M = 161).
    pub fn transition_factor(&self) -> f64 {
        match self {
            WindowType::Rectangular => 2.0,
            WindowType::Hann => 4.0,
            WindowType::Hamming => 4.0,
            WindowType::Blackman => 6.0,
        }
    }

    /// Measured transition width of a windowed-sinc design, in units of 2π/M
    pub fn approximate_transition_factor(&self) -> f64 {
        match self {
            WindowType::Rectangular => 0.9,
            WindowType::Hann => 3.1,
            WindowType::Hamming => 3.3,
            WindowType::Blackman => 5.5,
        }
    }

    /// Approximate peak sidelobe level in dB
    pub fn stopband_attenuation_db(&self) -> f64 {
        match self {
            WindowType::Rectangular => -21.0,
            WindowType::Hann => -44.0,
            WindowType::Hamming => -53.0,
            WindowType::Blackman => -74.0,
        }
    }

    /// Display name, also accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Rectangular => "Rectangular",
            WindowType::Hann => "Hann",
            WindowType::Hamming => "Hamming",
            WindowType::Blackman => "Blackman",
        }
    }
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hamming
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown window name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown window type '{0}'")]
pub struct ParseWindowError(pub String);

impl FromStr for WindowType {
    type Err = ParseWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "boxcar" => Ok(WindowType::Rectangular),
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            _ => Err(ParseWindowError(s.to_string())),
        }
    }
}

/// Window value at index `n` of an `m`-point window (m >= 2)
#[inline]
fn window_value(window_type: WindowType, n: usize, m: usize) -> f64 {
    let denom = (m - 1) as f64;
    match window_type {
        WindowType::Rectangular => 1.0,
        WindowType::Hann => 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos(),
        WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * n as f64 / denom).cos(),
        WindowType::Blackman => {
            let angle = 2.0 * PI * n as f64 / denom;
            0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos()
        }
    }
}

/// Generate window coefficients
///
/// The second half is mirrored from the first so that `w[n] == w[M-1-n]`
/// holds exactly.
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    let mut window = vec![1.0; length];
    fill_window(window_type, &mut window);
    window
}

/// Fill an existing buffer with window coefficients
pub fn fill_window(window_type: WindowType, window: &mut [f64]) {
    let length = window.len();
    if length < 2 {
        window.fill(1.0);
        return;
    }

    for n in 0..(length + 1) / 2 {
        let w = window_value(window_type, n, length);
        window[n] = w;
        window[length - 1 - n] = w;
    }
}
