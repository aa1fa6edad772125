//! Audio capture, real-time block processing and device management

pub mod buffer;
pub mod device;
pub mod engine;
pub mod gate;
pub mod handoff;
pub mod input;
pub mod output;
pub mod processor;
pub mod snapshot;

pub use buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
pub use device::{AudioError, DeviceDescriptor, DeviceDirection, DeviceManager, StreamInfo};
pub use gate::{NoiseGate, NoiseGateConfig};
pub use processor::{AudioPipeline, FilterSummary, PipelineError, PipelineState};
pub use snapshot::ResultSnapshot;
