//! Audio pipeline - keeps the hot loop in Rust
//!
//! Capture, gating, filtering and analysis all run on one dedicated DSP
//! thread. The control side only queues commands, flips atomics and reads
//! published snapshots, so nothing it does can block the audio path.

use super::buffer::{AudioConsumer, AudioRingBuffer};
use super::device::{
    AudioError, DeviceDescriptor, DeviceDirection, DeviceManager, StreamHealth, StreamInfo,
};
use super::engine::{BlockProcessor, EngineFlags, EngineStats};
use super::gate::NoiseGateConfig;
use super::handoff::{link, ControlLink, EngineCommand};
use super::input::AudioInput;
use super::output::AudioOutput;
use super::snapshot::{snapshot_channel, ResultSnapshot, SnapshotReader};
use crate::config::{ConfigError, PipelineConfig};
use crate::filters::design::{design_filter, DesignError, FilterCoefficients, FilterSpec};
use crate::filters::fir::PreparedFilter;
use crate::spectrum::{AnalysisConfig, SpectralAnalyzer, WaterfallSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Sleep between polls of an empty capture ring
const IDLE_SLEEP: Duration = Duration::from_micros(100);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("control command queue is full ({0} pending)")]
    CommandQueueFull(usize),

    #[error("processing thread error: {0}")]
    Thread(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Running,
}

/// What `design_filter` reports back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSummary {
    pub length: usize,
    pub group_delay: f64,
}

struct Worker {
    handle: JoinHandle<BlockProcessor>,
    running: Arc<AtomicBool>,
    info: StreamInfo,
}

/// Everything the DSP thread needs besides the engine and its source
struct LoopContext {
    running: Arc<AtomicBool>,
    flags: Arc<EngineFlags>,
    health: Option<Arc<StreamHealth>>,
    failure: Arc<Mutex<Option<AudioError>>>,
    stall_timeout: Option<Duration>,
}

impl LoopContext {
    fn fail(&self, error: AudioError) {
        log::error!("capture stopped: {}", error);
        if let Ok(mut slot) = self.failure.lock() {
            slot.get_or_insert(error);
        }
        self.running.store(false, Ordering::Release);
    }
}

fn run_loop(
    mut engine: BlockProcessor,
    mut source: AudioConsumer,
    ctx: LoopContext,
) -> BlockProcessor {
    let mut last_data = Instant::now();

    while ctx.running.load(Ordering::Acquire) {
        if let Some(error) = ctx.health.as_ref().and_then(|h| h.error()) {
            ctx.fail(error);
            break;
        }

        if engine.pump(&mut source, &ctx.flags) > 0 {
            last_data = Instant::now();
            continue;
        }

        if let Some(timeout) = ctx.stall_timeout {
            if last_data.elapsed() >= timeout {
                ctx.fail(AudioError::Stalled(timeout.as_millis() as u64));
                break;
            }
        }

        thread::sleep(IDLE_SLEEP);
    }

    engine.discard_partial();
    engine
}

/// Real-time filtering and analysis pipeline
///
/// Control methods take effect at the next block boundary while running,
/// or immediately while stopped.
pub struct AudioPipeline {
    config: PipelineConfig,
    devices: DeviceManager,
    selected_input: Option<DeviceDescriptor>,

    control: ControlLink,
    reader: SnapshotReader,
    flags: Arc<EngineFlags>,

    /// Engine waiting between runs; keeps filter and gate state
    parked: Option<BlockProcessor>,
    worker: Option<Worker>,
    failure: Arc<Mutex<Option<AudioError>>>,

    input: Option<AudioInput>,
    output: Option<AudioOutput>,
    monitor_health: Option<Arc<StreamHealth>>,

    /// Control-side mirror of the engine's state
    filter: Option<Arc<FilterCoefficients>>,
    history_capacity: usize,
}

impl Default for AudioPipeline {
    fn default() -> Self {
        Self::build(PipelineConfig::default())
    }
}

impl AudioPipeline {
    /// Create a stopped pipeline
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        let (control, engine_link) = link(config.command_queue_capacity);
        let (writer, reader) = snapshot_channel();
        let engine = BlockProcessor::new(&config, engine_link, writer);
        let history_capacity = engine.convolver().history_capacity();

        Self {
            config,
            devices: DeviceManager::new(),
            selected_input: None,
            control,
            reader,
            flags: Arc::new(EngineFlags::default()),
            parked: Some(engine),
            worker: None,
            failure: Arc::new(Mutex::new(None)),
            input: None,
            output: None,
            monitor_health: None,
            filter: None,
            history_capacity,
        }
    }

    /// Replace a lost engine with a fresh one carrying the current settings
    fn rebuild_engine(&mut self) {
        let (control, engine_link) = link(self.config.command_queue_capacity);
        let (writer, reader) = snapshot_channel();
        let mut engine = BlockProcessor::new(&self.config, engine_link, writer);

        self.control = control;
        self.reader = reader;
        self.history_capacity = engine.convolver().history_capacity();

        if let Some(coefficients) = self.filter.clone() {
            let prepared = PreparedFilter::prepare(
                coefficients,
                self.history_capacity,
                self.config.block_size,
            );
            self.history_capacity = prepared.required_capacity(self.history_capacity);
            if self.control.send(EngineCommand::SetFilter(prepared)).is_ok() {
                engine.apply_pending();
            }
        }
        self.control.reclaim();
        self.parked = Some(engine);
    }

    // ----- lifecycle -----

    /// Open the selected (or default) capture device and start processing
    ///
    /// Starting while running returns the current stream.
    pub fn start(&mut self) -> Result<StreamInfo, PipelineError> {
        self.reap();
        if let Some(worker) = &self.worker {
            return Ok(worker.info.clone());
        }

        let descriptor = match &self.selected_input {
            Some(descriptor) => descriptor.clone(),
            None => self.devices.default_input()?,
        };

        let (producer, consumer) = AudioRingBuffer::new(self.config.capture_buffer_capacity).split();
        let health = StreamHealth::new();
        let input = self.devices.open_input(
            &descriptor,
            self.config.sample_rate,
            producer,
            Arc::clone(&health),
        )?;
        input.start()?;

        let info = input.info().clone();
        self.input = Some(input);

        if let Err(err) = self.spawn(consumer, info.clone(), Some(health)) {
            self.release_input();
            return Err(err);
        }

        log::info!(
            "capture started on '{}' at {} Hz",
            info.device_name,
            info.sample_rate
        );
        Ok(info)
    }

    /// Start processing samples from an existing capture ring
    ///
    /// For headless use: whatever owns the producer end plays the device.
    pub fn start_with_source(
        &mut self,
        source: AudioConsumer,
        device_name: &str,
    ) -> Result<StreamInfo, PipelineError> {
        self.reap();
        if let Some(worker) = &self.worker {
            return Ok(worker.info.clone());
        }

        let info = StreamInfo {
            device_name: device_name.to_string(),
            sample_rate: self.config.sample_rate,
            channels: 1,
        };
        self.spawn(source, info.clone(), None)?;
        Ok(info)
    }

    fn spawn(
        &mut self,
        source: AudioConsumer,
        info: StreamInfo,
        health: Option<Arc<StreamHealth>>,
    ) -> Result<(), PipelineError> {
        if self.parked.is_none() {
            self.rebuild_engine();
        }
        let engine = self
            .parked
            .take()
            .ok_or_else(|| PipelineError::Thread("no engine available".into()))?;

        if let Ok(mut slot) = self.failure.lock() {
            *slot = None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let ctx = LoopContext {
            running: Arc::clone(&running),
            flags: Arc::clone(&self.flags),
            health,
            failure: Arc::clone(&self.failure),
            stall_timeout: self.config.stall_timeout(),
        };

        let spawned = thread::Builder::new()
            .name("firscope-dsp".into())
            .spawn(move || run_loop(engine, source, ctx));

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    running,
                    info,
                });
                Ok(())
            }
            Err(err) => {
                // The engine went down with the closure
                self.rebuild_engine();
                Err(PipelineError::Thread(err.to_string()))
            }
        }
    }

    /// Stop processing and release the capture device; idempotent
    ///
    /// The block in flight completes before this returns.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::Release);
            self.join(worker);
            log::info!("capture stopped");
        }
        self.release_input();
        self.control.reclaim();
    }

    fn join(&mut self, worker: Worker) {
        match worker.handle.join() {
            Ok(engine) => {
                self.parked = Some(engine);
                // Commands queued after the last block still apply
                self.apply_parked();
            }
            Err(_) => {
                log::error!("processing thread panicked; rebuilding engine");
                self.rebuild_engine();
            }
        }
    }

    /// Collect a worker that ended on its own after a device failure
    fn reap(&mut self) {
        let finished = self
            .worker
            .as_ref()
            .map_or(false, |w| !w.running.load(Ordering::Acquire));
        if finished {
            if let Some(worker) = self.worker.take() {
                self.join(worker);
            }
            self.release_input();
        }
    }

    fn release_input(&mut self) {
        if let Some(input) = self.input.take() {
            if let Err(err) = input.pause() {
                log::warn!("failed to pause capture stream: {}", err);
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        match &self.worker {
            Some(worker) if worker.running.load(Ordering::Acquire) => PipelineState::Running,
            _ => PipelineState::Stopped,
        }
    }

    /// Terminal device error that ended the last run, reported once
    pub fn take_error(&mut self) -> Option<PipelineError> {
        self.reap();
        self.failure
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(PipelineError::Audio)
    }

    /// Stream description while running
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.worker.as_ref().map(|w| &w.info)
    }

    // ----- control -----

    fn apply_parked(&mut self) {
        if let Some(engine) = self.parked.as_mut() {
            engine.apply_pending();
        }
        self.control.reclaim();
    }

    fn send(&mut self, command: EngineCommand) -> Result<(), PipelineError> {
        self.control.reclaim();
        if let Err(command) = self.control.send(command) {
            log::warn!("dropping {} command: queue full", command.name());
            return Err(PipelineError::CommandQueueFull(self.control.pending()));
        }
        self.apply_parked();
        Ok(())
    }

    /// Design a filter and swap it in at the next block boundary
    ///
    /// An invalid spec leaves the active filter untouched.
    pub fn design_filter(&mut self, spec: &FilterSpec) -> Result<FilterSummary, PipelineError> {
        let coefficients = Arc::new(design_filter(spec)?);
        self.set_coefficients(coefficients)
    }

    /// Swap in precomputed coefficients
    pub fn set_coefficients(
        &mut self,
        coefficients: Arc<FilterCoefficients>,
    ) -> Result<FilterSummary, PipelineError> {
        let summary = FilterSummary {
            length: coefficients.len(),
            group_delay: coefficients.group_delay(),
        };

        let prepared = PreparedFilter::prepare(
            Arc::clone(&coefficients),
            self.history_capacity,
            self.config.block_size,
        );
        let capacity = prepared.required_capacity(self.history_capacity);
        self.send(EngineCommand::SetFilter(prepared))?;

        self.history_capacity = capacity;
        self.filter = Some(coefficients);

        log::info!(
            "filter queued: {} taps, group delay {} samples",
            summary.length,
            summary.group_delay
        );
        Ok(summary)
    }

    /// Active filter, `None` while still the initial identity
    pub fn filter(&self) -> Option<&Arc<FilterCoefficients>> {
        self.filter.as_ref()
    }

    pub fn set_bypass(&self, bypass: bool) {
        self.flags.bypass.store(bypass, Ordering::Release);
    }

    pub fn is_bypassed(&self) -> bool {
        self.flags.bypass.load(Ordering::Acquire)
    }

    /// Reconfigure the gate; its envelope carries over
    pub fn configure_noise_gate(&mut self, config: NoiseGateConfig) -> Result<(), PipelineError> {
        config.validate()?;
        self.send(EngineCommand::ConfigureGate(config))?;
        self.config.noise_gate = config;
        Ok(())
    }

    pub fn noise_gate_config(&self) -> &NoiseGateConfig {
        &self.config.noise_gate
    }

    /// Replace the analyzer; clears the waterfall
    pub fn update_analysis_config(&mut self, config: AnalysisConfig) -> Result<(), PipelineError> {
        config.validate()?;
        let analyzer = Box::new(SpectralAnalyzer::new(
            config,
            self.config.sample_rate as f64,
        ));
        self.send(EngineCommand::ConfigureAnalysis(analyzer))?;
        self.config.analysis = config;
        Ok(())
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.config.analysis
    }

    pub fn clear_waterfall(&mut self) -> Result<(), PipelineError> {
        self.send(EngineCommand::ClearWaterfall)
    }

    /// Play the filtered signal on the default output device
    ///
    /// Use headphones to avoid a feedback loop.
    pub fn enable_monitoring(&mut self) -> Result<(), PipelineError> {
        if self.output.is_some() {
            self.flags.monitoring.store(true, Ordering::Release);
            return Ok(());
        }

        let descriptor = self.devices.default_output()?;
        let (producer, consumer) = AudioRingBuffer::new(self.config.monitor_buffer_capacity).split();
        let health = StreamHealth::new();
        let output = self.devices.open_output(
            &descriptor,
            self.config.sample_rate,
            consumer,
            Arc::clone(&health),
        )?;
        output.start()?;

        self.send(EngineCommand::AttachMonitor(producer))?;
        log::info!("monitoring on '{}'", output.info().device_name);

        self.output = Some(output);
        self.monitor_health = Some(health);
        self.flags.monitoring.store(true, Ordering::Release);
        Ok(())
    }

    pub fn disable_monitoring(&mut self) {
        self.flags.monitoring.store(false, Ordering::Release);
        self.monitor_health = None;

        if let Some(output) = self.output.take() {
            if let Err(err) = output.pause() {
                log::warn!("failed to pause monitor stream: {}", err);
            }
            if let Err(err) = self.send(EngineCommand::DetachMonitor) {
                log::warn!("monitor producer not detached: {}", err);
            }
        }
    }

    /// Monitoring is on and its output stream has not failed
    pub fn is_monitoring(&self) -> bool {
        self.flags.monitoring.load(Ordering::Acquire)
            && self
                .monitor_health
                .as_ref()
                .map_or(false, |health| !health.has_failed())
    }

    // ----- results -----

    /// Latest published snapshot; repeated calls see the same one until a
    /// new block is processed
    pub fn get_results(&self) -> Option<ResultSnapshot> {
        self.reader.latest()
    }

    /// Latest published waterfall, and ask for a fresher copy
    pub fn get_waterfall(&mut self) -> Option<WaterfallSnapshot> {
        match self.parked.as_mut() {
            Some(engine) => engine.publish_waterfall(),
            None => self.flags.waterfall_request.store(true, Ordering::Release),
        }
        self.reader.latest_waterfall()
    }

    /// Counters from the parked engine; `None` while running
    pub fn engine_stats(&self) -> Option<EngineStats> {
        self.parked.as_ref().map(|engine| engine.stats())
    }

    // ----- devices -----

    /// Use `device` (or the default with `None`) on the next start
    pub fn select_input_device(
        &mut self,
        device: Option<DeviceDescriptor>,
    ) -> Result<(), PipelineError> {
        if let Some(descriptor) = &device {
            if descriptor.direction != DeviceDirection::Input {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is not a capture device",
                    descriptor.name
                ))
                .into());
            }
        }
        self.selected_input = device;
        Ok(())
    }

    pub fn input_devices(&self) -> Result<Vec<DeviceDescriptor>, PipelineError> {
        Ok(self.devices.input_devices()?)
    }

    /// Names of the available capture devices on the default host
    ///
    /// Needs no pipeline, so callers can list devices before building one.
    pub fn list_devices() -> Result<Vec<String>, PipelineError> {
        Ok(DeviceManager::new()
            .input_devices()?
            .into_iter()
            .map(|device| device.name)
            .collect())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.stop();
        self.disable_monitoring();
    }
}
