//! Pipeline configuration
//!
//! Everything here is validated on the control thread before any of it
//! reaches the audio thread.

use crate::audio::gate::NoiseGateConfig;
use crate::spectrum::analysis::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Largest block the pipeline processes at once
pub const MAX_BLOCK_SIZE: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

/// Top-level pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capture sample rate in Hz; devices must run at this rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples per processing block (and per published waveform)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Capture ring buffer capacity in samples
    #[serde(default = "default_ring_capacity")]
    pub capture_buffer_capacity: usize,

    /// Monitor output ring buffer capacity in samples
    #[serde(default = "default_ring_capacity")]
    pub monitor_buffer_capacity: usize,

    /// Pending control commands the audio thread can lag behind by
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,

    /// Capture silence after which the stream counts as stalled; 0 disables
    /// the watchdog
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub noise_gate: NoiseGateConfig,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    1024
}

fn default_ring_capacity() -> usize {
    96000
}

fn default_command_queue_capacity() -> usize {
    64
}

fn default_stall_timeout_ms() -> u64 {
    2000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            capture_buffer_capacity: default_ring_capacity(),
            monitor_buffer_capacity: default_ring_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
            stall_timeout_ms: default_stall_timeout_ms(),
            analysis: AnalysisConfig::default(),
            noise_gate: NoiseGateConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse from TOML text; missing fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample rate must be positive".into()));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::Invalid(format!(
                "block size must be in 1..={}, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        if self.capture_buffer_capacity < 2 * self.block_size {
            return Err(ConfigError::Invalid(format!(
                "capture buffer ({}) must hold at least two blocks of {}",
                self.capture_buffer_capacity, self.block_size
            )));
        }
        if self.monitor_buffer_capacity < self.block_size {
            return Err(ConfigError::Invalid(format!(
                "monitor buffer ({}) must hold at least one block of {}",
                self.monitor_buffer_capacity, self.block_size
            )));
        }
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::Invalid("command queue capacity must be positive".into()));
        }
        self.analysis.validate()?;
        self.noise_gate.validate()?;
        Ok(())
    }

    /// Watchdog timeout, `None` when disabled
    pub fn stall_timeout(&self) -> Option<Duration> {
        (self.stall_timeout_ms > 0).then(|| Duration::from_millis(self.stall_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::WindowType;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.stall_timeout(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            block_size = 512

            [analysis]
            fft_size = 4096
            window = "Blackman"
            "#,
        )
        .unwrap();

        assert_eq!(config.block_size, 512);
        assert_eq!(config.analysis.fft_size, 4096);
        assert_eq!(config.analysis.window, WindowType::Blackman);
        assert!(config.analysis.apply_correction);
        assert_eq!(config.noise_gate, NoiseGateConfig::default());
        assert_eq!(config.sample_rate, 48000);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.noise_gate.enabled = true;
        config.stall_timeout_ms = 500;

        let text = config.to_toml_string().unwrap();
        assert_eq!(PipelineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_disabled_stall_timeout_survives_round_trip() {
        let config = PipelineConfig {
            stall_timeout_ms: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.stall_timeout(), None);

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("stall_timeout_ms = 0"), "{}", text);

        let reloaded = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(reloaded.stall_timeout(), None);
        assert_eq!(reloaded, config);

        let reloaded = PipelineConfig::from_toml_str("stall_timeout_ms = 0").unwrap();
        assert_eq!(reloaded.stall_timeout(), None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            PipelineConfig::from_toml_str("block_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[analysis]\nfft_size = 1000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("block_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            PipelineConfig::load("/nonexistent/firscope.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
