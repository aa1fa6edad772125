//! Audio device enumeration and opening
//!
//! Everything here runs on the control thread. Opening a device always
//! re-enumerates, so a descriptor that outlived its device fails cleanly.

use super::buffer::{AudioConsumer, AudioProducer};
use super::input::AudioInput;
use super::output::AudioOutput;
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{
    Device, Host, SampleFormat, SampleRate, SupportedStreamConfig, SupportedStreamConfigRange,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Rates probed against each device's supported config ranges
pub const STANDARD_SAMPLE_RATES: [u32; 11] = [
    8000, 11025, 16000, 22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000,
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Audio device '{0}' is no longer available")]
    DeviceUnavailable(String),

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to query device configuration: {0}")]
    Config(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Device '{device}' does not support {required} Hz. Please change the device sample rate to {required} Hz in system settings.")]
    UnsupportedSampleRate { device: String, required: u32 },

    #[error("Audio stream failed: {0}")]
    StreamFailed(String),

    #[error("No audio captured for {0} ms")]
    Stalled(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceDirection {
    Input,
    Output,
}

impl fmt::Display for DeviceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceDirection::Input => f.write_str("input"),
            DeviceDirection::Output => f.write_str("output"),
        }
    }
}

/// Audio device information
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub direction: DeviceDirection,
    pub is_default: bool,
    pub default_sample_rate: Option<u32>,
    pub supported_sample_rates: Vec<u32>,
    pub channels: u16,
}

impl DeviceDescriptor {
    pub fn supports_rate(&self, sample_rate: u32) -> bool {
        self.supported_sample_rates.contains(&sample_rate)
    }
}

/// Stream description returned once capture is running
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub device_name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Failure latch shared between a cpal error callback and the pipeline
///
/// The data callbacks never touch it; only the error callback takes the lock.
#[derive(Debug, Default)]
pub struct StreamHealth {
    failed: AtomicBool,
    message: Mutex<Option<String>>,
}

impl StreamHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record the first failure; later ones are ignored
    pub fn report(&self, message: String) {
        if let Ok(mut slot) = self.message.lock() {
            if slot.is_none() {
                *slot = Some(message);
            }
        }
        self.failed.store(true, Ordering::Release);
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<AudioError> {
        if !self.has_failed() {
            return None;
        }
        let message = self
            .message
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| "unknown stream error".to_string());
        Some(AudioError::StreamFailed(message))
    }
}

/// Enumerates and opens devices on a cpal host
pub struct DeviceManager {
    host: Host,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    /// Manager over the platform's default host
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// All capture and playback devices
    pub fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError> {
        let mut devices = self.input_devices()?;
        devices.extend(self.output_devices()?);
        Ok(devices)
    }

    pub fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        Ok(devices
            .filter_map(|device| describe(&device, DeviceDirection::Input, default_name.as_deref()))
            .collect())
    }

    pub fn output_devices(&self) -> Result<Vec<DeviceDescriptor>, AudioError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        Ok(devices
            .filter_map(|device| describe(&device, DeviceDirection::Output, default_name.as_deref()))
            .collect())
    }

    pub fn default_input(&self) -> Result<DeviceDescriptor, AudioError> {
        let device = self.host.default_input_device().ok_or(AudioError::NoDevice)?;
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;
        describe(&device, DeviceDirection::Input, Some(&name)).ok_or(AudioError::NoDevice)
    }

    pub fn default_output(&self) -> Result<DeviceDescriptor, AudioError> {
        let device = self.host.default_output_device().ok_or(AudioError::NoDevice)?;
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;
        describe(&device, DeviceDirection::Output, Some(&name)).ok_or(AudioError::NoDevice)
    }

    /// Open `descriptor` for capture at `sample_rate`, pushing mono into `producer`
    pub fn open_input(
        &self,
        descriptor: &DeviceDescriptor,
        sample_rate: u32,
        producer: AudioProducer,
        health: Arc<StreamHealth>,
    ) -> Result<AudioInput, AudioError> {
        let device = self.find(descriptor, DeviceDirection::Input)?;
        AudioInput::from_device(device, sample_rate, producer, health)
    }

    /// Open `descriptor` for playback at `sample_rate`, pulling mono from `consumer`
    pub fn open_output(
        &self,
        descriptor: &DeviceDescriptor,
        sample_rate: u32,
        consumer: AudioConsumer,
        health: Arc<StreamHealth>,
    ) -> Result<AudioOutput, AudioError> {
        let device = self.find(descriptor, DeviceDirection::Output)?;
        AudioOutput::from_device(device, sample_rate, consumer, health)
    }

    fn find(
        &self,
        descriptor: &DeviceDescriptor,
        direction: DeviceDirection,
    ) -> Result<Device, AudioError> {
        let devices: Vec<Device> = match direction {
            DeviceDirection::Input => self.host.input_devices().map(|d| d.collect()),
            DeviceDirection::Output => self.host.output_devices().map(|d| d.collect()),
        }
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        devices
            .into_iter()
            .find(|device| device.name().map_or(false, |name| name == descriptor.name))
            .ok_or_else(|| AudioError::DeviceUnavailable(descriptor.name.clone()))
    }
}

fn describe(
    device: &Device,
    direction: DeviceDirection,
    default_name: Option<&str>,
) -> Option<DeviceDescriptor> {
    let name = device.name().ok()?;

    let (default_config, ranges) = match direction {
        DeviceDirection::Input => (
            device.default_input_config().ok(),
            device
                .supported_input_configs()
                .map(|configs| configs.collect::<Vec<_>>())
                .ok()?,
        ),
        DeviceDirection::Output => (
            device.default_output_config().ok(),
            device
                .supported_output_configs()
                .map(|configs| configs.collect::<Vec<_>>())
                .ok()?,
        ),
    };

    let channels = default_config
        .as_ref()
        .map(|c| c.channels())
        .or_else(|| ranges.iter().map(|r| r.channels()).max())?;

    Some(DeviceDescriptor {
        is_default: default_name == Some(name.as_str()),
        name,
        direction,
        default_sample_rate: default_config.map(|c| c.sample_rate().0),
        supported_sample_rates: supported_rates(&ranges),
        channels,
    })
}

/// Standard rates covered by any of `ranges`
pub(crate) fn supported_rates(ranges: &[SupportedStreamConfigRange]) -> Vec<u32> {
    STANDARD_SAMPLE_RATES
        .iter()
        .copied()
        .filter(|&rate| {
            ranges
                .iter()
                .any(|r| r.min_sample_rate().0 <= rate && rate <= r.max_sample_rate().0)
        })
        .collect()
}

/// Pick a config running at `sample_rate`
///
/// Float formats win over integer ones, then the channel count closest to
/// `preferred_channels`.
pub(crate) fn select_config(
    ranges: Vec<SupportedStreamConfigRange>,
    device_name: &str,
    sample_rate: u32,
    preferred_channels: u16,
) -> Result<SupportedStreamConfig, AudioError> {
    let format_rank = |format: SampleFormat| match format {
        SampleFormat::F32 => 0,
        SampleFormat::I16 => 1,
        SampleFormat::U16 => 2,
        _ => 3,
    };

    ranges
        .into_iter()
        .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
        .min_by_key(|r| {
            (
                format_rank(r.sample_format()),
                r.channels().abs_diff(preferred_channels),
            )
        })
        .map(|r| r.with_sample_rate(SampleRate(sample_rate)))
        .ok_or_else(|| AudioError::UnsupportedSampleRate {
            device: device_name.to_string(),
            required: sample_rate,
        })
}
