//! Audio input capture using cpal
//!
//! The data callback owns its ring producer outright: it down-mixes each
//! buffer to mono and pushes it without locking or allocating.

use super::buffer::AudioProducer;
use super::device::{select_config, AudioError, StreamHealth, StreamInfo};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::Arc;

/// Audio input stream
pub struct AudioInput {
    stream: Stream,
    info: StreamInfo,
}

impl AudioInput {
    /// Build a capture stream on `device` at exactly `sample_rate`
    ///
    /// The stream is created paused; call [`AudioInput::start`].
    pub fn from_device(
        device: Device,
        sample_rate: u32,
        producer: AudioProducer,
        health: Arc<StreamHealth>,
    ) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let ranges = device
            .supported_input_configs()
            .map_err(|e| AudioError::Config(e.to_string()))?
            .collect();
        let config = select_config(ranges, &name, sample_rate, 1)?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.config();

        let info = StreamInfo {
            device_name: name,
            sample_rate,
            channels: stream_config.channels,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer, health),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer, health),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer, health),
            other => Err(AudioError::Config(format!(
                "unsupported capture sample format {:?}",
                other
            ))),
        }?;

        log::debug!(
            "capture stream on '{}': {} Hz, {} channel(s), {:?}",
            info.device_name,
            info.sample_rate,
            info.channels,
            sample_format
        );

        Ok(Self { stream, info })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio capture
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
    mut producer: AudioProducer,
    health: Arc<StreamHealth>,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f64: FromSample<T>,
{
    let channels = config.channels as usize;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                producer.write_interleaved(data, channels, <f64 as FromSample<T>>::from_sample_);
            },
            move |err| health.report(err.to_string()),
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}
