//! Linear-phase FIR design using the windowing method

use super::windows::{generate_window, WindowType};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest filter the designer will emit.
///
/// Filters past the direct-form limit run through FFT convolution, so this
/// only bounds memory: the kernel, FFT frame and history each hold about
/// twice this many samples.
pub const MAX_FILTER_LENGTH: usize = 65535;

/// Shortest filter the designer will emit
pub const MIN_FILTER_LENGTH: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DesignError {
    #[error("invalid filter spec: {0}")]
    InvalidSpec(String),

    /// Valid spec whose filter is longer than the engine will hold
    #[error("filter needs {taps} taps, more than the supported {max}")]
    TooLong { taps: usize, max: usize },
}

/// Band type of the designed filter; Bandpass when unspecified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    Lowpass,
    Highpass,
    #[default]
    Bandpass,
}

impl FilterType {
    pub fn name(&self) -> &'static str {
        match self {
            FilterType::Lowpass => "Lowpass",
            FilterType::Highpass => "Highpass",
            FilterType::Bandpass => "Bandpass",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterType {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" | "low-pass" | "lp" => Ok(FilterType::Lowpass),
            "highpass" | "high-pass" | "hp" => Ok(FilterType::Highpass),
            "bandpass" | "band-pass" | "bp" => Ok(FilterType::Bandpass),
            _ => Err(DesignError::InvalidSpec(format!("unknown filter type '{}'", s))),
        }
    }
}

/// Filter specification
///
/// Cutoffs are normalized to [0, 1] where 1 is Nyquist (units of π rad/sample).
/// Lowpass reads `omega_c2`, Highpass reads `omega_c1`, Bandpass reads both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterType,

    /// Lower cutoff (normalized)
    pub omega_c1: f64,

    /// Upper cutoff (normalized)
    pub omega_c2: f64,

    /// Transition width (radians)
    pub transition_width: f64,

    pub window: WindowType,
}

impl FilterSpec {
    pub fn new(
        kind: FilterType,
        omega_c1: f64,
        omega_c2: f64,
        transition_width: f64,
        window: WindowType,
    ) -> Self {
        Self {
            kind,
            omega_c1,
            omega_c2,
            transition_width,
            window,
        }
    }

    pub fn lowpass(cutoff: f64, transition_width: f64, window: WindowType) -> Self {
        Self::new(FilterType::Lowpass, 0.0, cutoff, transition_width, window)
    }

    pub fn highpass(cutoff: f64, transition_width: f64, window: WindowType) -> Self {
        Self::new(FilterType::Highpass, cutoff, 1.0, transition_width, window)
    }

    pub fn bandpass(
        omega_c1: f64,
        omega_c2: f64,
        transition_width: f64,
        window: WindowType,
    ) -> Self {
        Self::new(FilterType::Bandpass, omega_c1, omega_c2, transition_width, window)
    }

    /// Part A reference design: passband [0.4π, 0.6π], Δω = 0.05π
    pub fn from_part_a(window: WindowType) -> Self {
        Self::bandpass(0.4, 0.6, 0.05 * PI, window)
    }

    /// Check the spec without designing anything
    pub fn validate(&self) -> Result<(), DesignError> {
        if !self.transition_width.is_finite() || self.transition_width <= 0.0 {
            return Err(DesignError::InvalidSpec(format!(
                "transition width must be a positive number of radians, got {}",
                self.transition_width
            )));
        }

        let check_cutoff = |name: &str, value: f64| {
            if value.is_finite() && (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(DesignError::InvalidSpec(format!(
                    "{} must lie in [0, 1], got {}",
                    name, value
                )))
            }
        };

        match self.kind {
            FilterType::Lowpass => check_cutoff("omega_c2", self.omega_c2)?,
            FilterType::Highpass => check_cutoff("omega_c1", self.omega_c1)?,
            FilterType::Bandpass => {
                check_cutoff("omega_c1", self.omega_c1)?;
                check_cutoff("omega_c2", self.omega_c2)?;
                if self.omega_c1 >= self.omega_c2 {
                    return Err(DesignError::InvalidSpec(format!(
                        "bandpass needs omega_c1 < omega_c2, got {} >= {}",
                        self.omega_c1, self.omega_c2
                    )));
                }
            }
        }

        self.filter_length().map(|_| ())
    }

    /// Filter length M for this spec's window and transition width
    ///
    /// `M = ceil(factor * 2π / Δω)`, bumped to the next odd value and to at
    /// least 3 so the group delay is a whole number of samples.
    pub fn filter_length(&self) -> Result<usize, DesignError> {
        if !self.transition_width.is_finite() || self.transition_width <= 0.0 {
            return Err(DesignError::InvalidSpec(format!(
                "transition width must be a positive number of radians, got {}",
                self.transition_width
            )));
        }

        let raw = (self.window.transition_factor() * 2.0 * PI / self.transition_width).ceil();
        if raw > MAX_FILTER_LENGTH as f64 {
            // Saturating cast; only used for the message
            return Err(DesignError::TooLong {
                taps: raw as usize | 1,
                max: MAX_FILTER_LENGTH,
            });
        }

        let m = (raw as usize).max(MIN_FILTER_LENGTH);
        Ok(if m % 2 == 0 { m + 1 } else { m })
    }
}

/// Designed filter taps, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    taps: Vec<f64>,
    group_delay: f64,
    spec: Option<FilterSpec>,
}

impl FilterCoefficients {
    /// Pass-through filter (single unit tap)
    pub fn identity() -> Self {
        Self::from_taps(vec![1.0])
    }

    /// Wrap hand-made taps
    pub fn from_taps(taps: Vec<f64>) -> Self {
        let group_delay = taps.len().saturating_sub(1) as f64 / 2.0;
        Self {
            taps,
            group_delay,
            spec: None,
        }
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Group delay in samples, (M-1)/2
    pub fn group_delay(&self) -> f64 {
        self.group_delay
    }

    /// Spec this filter was designed from, if any
    pub fn spec(&self) -> Option<&FilterSpec> {
        self.spec.as_ref()
    }

    /// Magnitude response in dB at normalized frequencies
    pub fn magnitude_response_db(&self, frequencies: &[f64]) -> Vec<f64> {
        magnitude_response_db(&self.taps, frequencies)
    }
}

/// Ideal (unwindowed) impulse response at offset `n` from the center
#[inline]
fn ideal_response(kind: FilterType, wc1: f64, wc2: f64, n: f64) -> f64 {
    let sinc_lowpass = |wc: f64| {
        if n == 0.0 {
            wc / PI
        } else {
            (wc * n).sin() / (PI * n)
        }
    };

    match kind {
        FilterType::Lowpass => sinc_lowpass(wc2),
        // Spectral inversion: δ[n] - lowpass
        FilterType::Highpass => {
            let delta = if n == 0.0 { 1.0 } else { 0.0 };
            delta - sinc_lowpass(wc1)
        }
        FilterType::Bandpass => sinc_lowpass(wc2) - sinc_lowpass(wc1),
    }
}

/// Design a linear-phase FIR filter using the windowing method
///
/// # Algorithm
/// 1. Size the filter from the window's transition factor
/// 2. Evaluate the ideal sinc response centered at (M-1)/2
/// 3. Multiply by the window (no gain renormalization)
///
/// The taps are computed for the first half and mirrored, so the result is
/// exactly symmetric.
pub fn design_filter(spec: &FilterSpec) -> Result<FilterCoefficients, DesignError> {
    spec.validate()?;
    let m = spec.filter_length()?;

    let wc1 = spec.omega_c1 * PI;
    let wc2 = spec.omega_c2 * PI;
    let window = generate_window(spec.window, m);
    let center = (m - 1) / 2;

    let mut taps = vec![0.0; m];
    for n in 0..=center {
        let offset = n as f64 - center as f64;
        let h = ideal_response(spec.kind, wc1, wc2, offset) * window[n];
        taps[n] = h;
        taps[m - 1 - n] = h;
    }

    Ok(FilterCoefficients {
        taps,
        group_delay: center as f64,
        spec: Some(*spec),
    })
}

/// Design a lowpass filter (convenience wrapper)
pub fn design_lowpass_fir(
    cutoff: f64,
    transition_width: f64,
    window: WindowType,
) -> Result<FilterCoefficients, DesignError> {
    design_filter(&FilterSpec::lowpass(cutoff, transition_width, window))
}

/// Design a highpass filter (convenience wrapper)
pub fn design_highpass_fir(
    cutoff: f64,
    transition_width: f64,
    window: WindowType,
) -> Result<FilterCoefficients, DesignError> {
    design_filter(&FilterSpec::highpass(cutoff, transition_width, window))
}

/// Calculate frequency response at given frequencies
///
/// # Arguments
/// * `h` - Filter coefficients
/// * `frequencies` - Normalized frequencies (units of π rad/sample)
///
/// # Returns
/// Complex frequency response H(e^jω)
pub fn frequency_response(h: &[f64], frequencies: &[f64]) -> Vec<Complex64> {
    frequencies
        .iter()
        .map(|&omega| {
            let omega_rad = omega * PI;
            h.iter()
                .enumerate()
                .map(|(n, &h_n)| h_n * Complex64::from_polar(1.0, -(omega_rad * n as f64)))
                .sum()
        })
        .collect()
}

/// Calculate magnitude response in dB
pub fn magnitude_response_db(h: &[f64], frequencies: &[f64]) -> Vec<f64> {
    frequency_response(h, frequencies)
        .iter()
        .map(|c| 20.0 * c.norm().max(1e-12).log10())
        .collect()
}
