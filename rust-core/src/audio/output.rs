//! Audio output playback using cpal
//!
//! Plays the filtered mono signal for monitoring, duplicated across the
//! device's channels. Underruns play silence.

use super::buffer::AudioConsumer;
use super::device::{select_config, AudioError, StreamHealth, StreamInfo};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::Arc;

/// Audio output stream
pub struct AudioOutput {
    stream: Stream,
    info: StreamInfo,
}

impl AudioOutput {
    /// Build a playback stream on `device` at exactly `sample_rate`
    pub fn from_device(
        device: Device,
        sample_rate: u32,
        consumer: AudioConsumer,
        health: Arc<StreamHealth>,
    ) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let ranges = device
            .supported_output_configs()
            .map_err(|e| AudioError::Config(e.to_string()))?
            .collect();
        let config = select_config(ranges, &name, sample_rate, 2)?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.config();

        let info = StreamInfo {
            device_name: name,
            sample_rate,
            channels: stream_config.channels,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, consumer, health),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, consumer, health),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, consumer, health),
            other => Err(AudioError::Config(format!(
                "unsupported playback sample format {:?}",
                other
            ))),
        }?;

        Ok(Self { stream, info })
    }

    /// Start playing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio playback
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: AudioConsumer,
    health: Arc<StreamHealth>,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f64>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                consumer.read_interleaved(data, channels, <T as FromSample<f64>>::from_sample_);
            },
            move |err| health.report(err.to_string()),
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}
