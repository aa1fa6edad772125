//! Noise gate with IIR envelope detection
//!
//! Reduces gain when signal level falls below threshold, useful for
//! removing background noise during silent periods.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// RMS detector time constant
const RMS_TIME_MS: f64 = 50.0;

/// Gap between the opening and closing thresholds
const HYSTERESIS_DB: f64 = 3.0;

/// Noise gate settings, changed only through [`NoiseGate::reconfigure`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseGateConfig {
    pub enabled: bool,

    /// Threshold in dB (e.g., -40.0)
    pub threshold_db: f64,

    /// Attack time in milliseconds (e.g., 10.0)
    pub attack_ms: f64,

    /// Release time in milliseconds (e.g., 100.0)
    pub release_ms: f64,
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_db: -40.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

impl NoiseGateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold_db.is_finite() || self.threshold_db > 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gate threshold must be a finite level <= 0 dB, got {}",
                self.threshold_db
            )));
        }
        for (name, value) in [("attack", self.attack_ms), ("release", self.release_ms)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "gate {} time must be positive, got {} ms",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Process state carried across blocks and reconfigurations
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeState {
    /// Smoothed gain applied to the signal, 0.0 to 1.0
    pub current_gain: f64,

    /// IIR-smoothed signal power (RMS squared)
    pub detector_energy: f64,

    /// Whether the gate is currently open (for hysteresis)
    pub is_open: bool,
}

/// Noise gate processor with IIR envelope follower
pub struct NoiseGate {
    config: NoiseGateConfig,

    /// Attack smoothing coefficient
    attack_coeff: f64,

    /// Release smoothing coefficient
    release_coeff: f64,

    /// RMS smoothing coefficient
    rms_coeff: f64,

    state: EnvelopeState,

    sample_rate: f64,
}

impl NoiseGate {
    /// Create a new noise gate
    ///
    /// # Arguments
    /// * `config` - Gate settings (validated by the caller)
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(config: NoiseGateConfig, sample_rate: f64) -> Self {
        Self {
            config,
            attack_coeff: Self::time_constant_to_coeff(config.attack_ms, sample_rate),
            release_coeff: Self::time_constant_to_coeff(config.release_ms, sample_rate),
            rms_coeff: Self::time_constant_to_coeff(RMS_TIME_MS, sample_rate),
            state: EnvelopeState::default(),
            sample_rate,
        }
    }

    /// Convert time constant in ms to exponential smoothing coefficient
    ///
    /// coeff = exp(-1 / (tau * sample_rate))
    pub fn time_constant_to_coeff(time_ms: f64, sample_rate: f64) -> f64 {
        let tau = time_ms * 0.001;
        (-1.0 / (tau * sample_rate)).exp()
    }

    /// Apply new settings; the envelope state carries over untouched
    pub fn reconfigure(&mut self, config: NoiseGateConfig) {
        self.attack_coeff = Self::time_constant_to_coeff(config.attack_ms, self.sample_rate);
        self.release_coeff = Self::time_constant_to_coeff(config.release_ms, self.sample_rate);
        self.config = config;
    }

    /// Update detector and gain for one sample, returning the gain
    #[inline]
    fn advance(&mut self, input: f64) -> f64 {
        let state = &mut self.state;

        state.detector_energy =
            self.rms_coeff * state.detector_energy + (1.0 - self.rms_coeff) * input * input;
        let level_db = 20.0 * (state.detector_energy.sqrt() + 1e-10).log10();

        if state.is_open {
            if level_db < self.config.threshold_db - HYSTERESIS_DB {
                state.is_open = false;
            }
        } else if level_db >= self.config.threshold_db {
            state.is_open = true;
        }

        let target_gain = if state.is_open { 1.0 } else { 0.0 };
        let coeff = if target_gain > state.current_gain {
            self.attack_coeff
        } else {
            self.release_coeff
        };

        state.current_gain = coeff * state.current_gain + (1.0 - coeff) * target_gain;
        state.current_gain
    }

    /// Process a block of samples into a new vector
    pub fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        let mut output = input.to_vec();
        self.process_block_inplace(&mut output);
        output
    }

    /// Process a block in-place
    ///
    /// When disabled the samples pass untouched, but the detector and gain
    /// keep following the signal so enabling mid-stream does not click.
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        if self.config.enabled {
            for sample in buffer.iter_mut() {
                let gain = self.advance(*sample);
                *sample *= gain;
            }
        } else {
            for &sample in buffer.iter() {
                self.advance(sample);
            }
        }
    }

    /// Reset gate state
    pub fn reset(&mut self) {
        self.state = EnvelopeState::default();
    }

    /// Current smoothed gain (0.0 to 1.0)
    pub fn envelope(&self) -> f64 {
        self.state.current_gain
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    pub fn state(&self) -> &EnvelopeState {
        &self.state
    }

    pub fn config(&self) -> &NoiseGateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 48000.0;

    fn gate(threshold_db: f64, attack_ms: f64, release_ms: f64) -> NoiseGate {
        NoiseGate::new(
            NoiseGateConfig {
                enabled: true,
                threshold_db,
                attack_ms,
                release_ms,
            },
            SAMPLE_RATE,
        )
    }

    #[test]
    fn test_noise_gate_opens_above_threshold() {
        let mut gate = gate(-40.0, 10.0, 100.0);

        // About -20 dB, long enough for the IIR detector to settle
        let output = gate.process_block(&vec![0.1; 5000]);

        assert!(gate.is_open());
        assert!(gate.envelope() > 0.5);
        assert!((output[4999] - 0.1 * gate.envelope()).abs() < 1e-12);
    }

    #[test]
    fn test_noise_gate_closes_below_threshold() {
        let mut gate = gate(-40.0, 10.0, 100.0);
        gate.process_block(&vec![0.1; 5000]);

        // About -80 dB; the detector and the release both need time
        gate.process_block(&vec![0.0001; 20000]);

        assert!(!gate.is_open());
        assert!(gate.envelope() < 0.5, "envelope {}", gate.envelope());
    }

    #[test]
    fn test_noise_gate_hysteresis() {
        let mut gate = gate(-40.0, 1.0, 1.0);
        assert!(!gate.is_open());

        // About -34 dB, clearly above threshold
        gate.process_block(&vec![0.02; 3000]);
        assert!(gate.is_open(), "gate should be open after strong signal");

        // About -42 dB: below threshold but above threshold - hysteresis
        gate.process_block(&vec![0.008; 1000]);
        assert!(gate.is_open(), "gate should still be open due to hysteresis");
    }

    #[test]
    fn test_reconfigure_keeps_envelope() {
        let mut gate = gate(-40.0, 10.0, 100.0);
        gate.process_block(&vec![0.1; 5000]);
        let before = *gate.state();

        gate.reconfigure(NoiseGateConfig {
            enabled: true,
            threshold_db: -50.0,
            attack_ms: 5.0,
            release_ms: 300.0,
        });

        assert_eq!(*gate.state(), before);
        assert_eq!(gate.config().release_ms, 300.0);
    }

    #[test]
    fn test_disabled_gate_passes_through_and_tracks() {
        let mut gate = gate(-40.0, 10.0, 100.0);
        let mut config = *gate.config();
        config.enabled = false;
        gate.reconfigure(config);

        let input = vec![0.1; 5000];
        let output = gate.process_block(&input);
        assert_eq!(output, input);

        // Envelope kept following the loud signal
        assert!(gate.is_open());
        assert!(gate.envelope() > 0.5);
    }

    #[test]
    fn test_config_validation() {
        assert!(NoiseGateConfig::default().validate().is_ok());

        let bad = [
            NoiseGateConfig { attack_ms: 0.0, ..Default::default() },
            NoiseGateConfig { release_ms: -1.0, ..Default::default() },
            NoiseGateConfig { threshold_db: f64::NAN, ..Default::default() },
            NoiseGateConfig { threshold_db: 6.0, ..Default::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    /// Samples in one time constant of `ms`
    fn time_constant_samples(ms: f64) -> usize {
        (ms * SAMPLE_RATE / 1000.0).round() as usize
    }

    #[test]
    fn test_attack_follows_time_constant() {
        let attack_ms = 10.0;
        let tau = time_constant_samples(attack_ms);
        // Threshold so low that the first sample of the tone opens the gate
        let mut gate = gate(-100.0, attack_ms, 100.0);

        gate.process_block(&[0.5]);
        assert!(gate.is_open());
        gate.process_block(&vec![0.5; tau - 1]);

        let expected = 1.0 - (-1.0f64).exp();
        assert!(
            (gate.envelope() - expected).abs() < 1e-9,
            "gain {} after {} samples, expected {}",
            gate.envelope(),
            tau,
            expected
        );

        // Five time constants in total
        gate.process_block(&vec![0.5; 4 * tau]);
        assert!(gate.is_open());
        assert!(1.0 - gate.envelope() < 0.01, "gain {}", gate.envelope());
    }

    #[test]
    fn test_release_follows_time_constant() {
        let release_ms = 100.0;
        let tau = time_constant_samples(release_ms);
        let threshold_db = -40.0;
        let mut gate = gate(threshold_db, 1.0, release_ms);

        gate.process_block(&vec![0.5; 48000]);
        assert!(gate.is_open());
        assert!((gate.envelope() - 1.0).abs() < 1e-9);

        // Constant level 20 dB under the threshold; the RMS detector takes
        // a while to fall, so count from the sample where the gate closes
        let quiet = 10f64.powf((threshold_db - 20.0) / 20.0);
        let mut gain_at_close = None;
        for _ in 0..48000 {
            let before = gate.envelope();
            gate.process_block(&[quiet]);
            if !gate.is_open() {
                gain_at_close = Some(before);
                break;
            }
        }
        let gain_at_close = gain_at_close.expect("gate never closed");
        assert!((gain_at_close - 1.0).abs() < 1e-6);

        gate.process_block(&vec![quiet; tau - 1]);
        assert!(!gate.is_open());
        let expected = gain_at_close * (-1.0f64).exp();
        assert!(
            (gate.envelope() - expected).abs() < 1e-9,
            "gain {} after {} samples, expected {}",
            gate.envelope(),
            tau,
            expected
        );
        assert!((gate.envelope() - (-1.0f64).exp()).abs() < 1e-6);

        gate.process_block(&vec![quiet; 4 * tau]);
        assert!(!gate.is_open());
        assert!(gate.envelope() < 0.01, "gain {}", gate.envelope());
    }

    #[test]
    fn test_time_constant_coefficient() {
        // One time constant of samples decays by exactly 1/e
        let coeff = NoiseGate::time_constant_to_coeff(10.0, SAMPLE_RATE);
        assert!((coeff.powi(480) - (-1.0f64).exp()).abs() < 1e-12);
    }
}
