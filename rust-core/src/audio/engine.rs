//! Per-block DSP state owned by the audio thread
//!
//! Block order: drain commands, noise gate, convolution (history only while
//! bypassed), monitor output, analysis, publish. A panic or a non-finite
//! sample in the DSP stages degrades that block to pass-through instead of
//! taking the stream down.

use super::buffer::{AudioConsumer, AudioProducer};
use super::gate::NoiseGate;
use super::handoff::{EngineCommand, EngineLink, Retired};
use super::snapshot::SnapshotWriter;
use crate::config::PipelineConfig;
use crate::filters::fir::ConvolutionEngine;
use crate::spectrum::SpectralAnalyzer;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Flags the control thread flips and the audio thread reads once per block
#[derive(Debug, Default)]
pub struct EngineFlags {
    pub bypass: AtomicBool,
    pub monitoring: AtomicBool,

    /// Set by readers that want a fresh waterfall copy
    pub waterfall_request: AtomicBool,
}

/// Counters for what happened inside the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub blocks: u64,
    pub fallback_blocks: u64,
    pub analysis_failures: u64,
}

pub struct BlockProcessor {
    block_size: usize,
    sample_rate: f64,

    gate: NoiseGate,
    convolver: ConvolutionEngine,
    analyzer: Box<SpectralAnalyzer>,
    monitor: Option<AudioProducer>,

    link: EngineLink,
    writer: SnapshotWriter,

    /// Captured block
    input: Vec<f64>,

    /// Samples of `input` filled so far
    filled: usize,

    /// Gate and filter output
    output: Vec<f64>,

    /// Waterfall changed since it was last published
    waterfall_dirty: bool,

    stats: EngineStats,
}

impl BlockProcessor {
    /// Allocate all block state; runs on the control thread
    pub fn new(config: &PipelineConfig, link: EngineLink, writer: SnapshotWriter) -> Self {
        let sample_rate = config.sample_rate as f64;

        Self {
            block_size: config.block_size,
            sample_rate,
            gate: NoiseGate::new(config.noise_gate, sample_rate),
            convolver: ConvolutionEngine::identity(),
            analyzer: Box::new(SpectralAnalyzer::new(config.analysis, sample_rate)),
            monitor: None,
            link,
            writer,
            input: vec![0.0; config.block_size],
            filled: 0,
            output: vec![0.0; config.block_size],
            waterfall_dirty: false,
            stats: EngineStats::default(),
        }
    }

    /// Apply every queued command
    pub fn apply_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(command) = self.link.next_command() {
            self.apply(command);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetFilter(prepared) => {
                let retired = self.convolver.replace(prepared);
                self.link.retire(Retired::Kernel(retired));
            }
            EngineCommand::ConfigureGate(config) => self.gate.reconfigure(config),
            EngineCommand::ConfigureAnalysis(analyzer) => {
                let old = std::mem::replace(&mut self.analyzer, analyzer);
                self.link.retire(Retired::Analyzer(old));
                self.waterfall_dirty = true;
            }
            EngineCommand::ClearWaterfall => {
                self.analyzer.clear_waterfall();
                self.waterfall_dirty = true;
            }
            EngineCommand::AttachMonitor(producer) => {
                if let Some(old) = self.monitor.replace(producer) {
                    self.link.retire(Retired::Monitor(old));
                }
            }
            EngineCommand::DetachMonitor => {
                if let Some(old) = self.monitor.take() {
                    self.link.retire(Retired::Monitor(old));
                }
            }
        }
    }

    /// Pull captured samples, processing each block as soon as it is full
    ///
    /// # Returns
    /// Number of samples read from `source`
    pub fn pump(&mut self, source: &mut AudioConsumer, flags: &EngineFlags) -> usize {
        let mut total = 0;
        loop {
            let read = source.read(&mut self.input[self.filled..]);
            total += read;
            self.filled += read;

            if self.filled < self.block_size {
                return total;
            }
            self.filled = 0;
            self.run_block(flags);
        }
    }

    /// Process one block given directly; `block` must be `block_size` long
    pub fn process_block(&mut self, block: &[f64], flags: &EngineFlags) {
        self.input.copy_from_slice(block);
        self.filled = 0;
        self.run_block(flags);
    }

    fn run_block(&mut self, flags: &EngineFlags) {
        self.apply_pending();

        let bypass = flags.bypass.load(Ordering::Acquire);
        self.output.copy_from_slice(&self.input);

        let gate = &mut self.gate;
        let convolver = &mut self.convolver;
        let output = &mut self.output;
        let dsp = panic::catch_unwind(AssertUnwindSafe(|| {
            gate.process_block_inplace(output);
            if bypass {
                convolver.push_history(output);
            } else {
                convolver.process_block_inplace(output);
            }
        }));

        let healthy = dsp.is_ok() && self.output.iter().all(|s| s.is_finite());
        if !healthy {
            self.stats.fallback_blocks += 1;
            log::error!(
                "DSP failure in block {}; passing input through and resetting filter state",
                self.stats.blocks
            );
            self.output.copy_from_slice(&self.input);
            self.convolver.reset();
            self.gate.reset();
        }

        if flags.monitoring.load(Ordering::Acquire) {
            if let Some(monitor) = self.monitor.as_mut() {
                monitor.write(&self.output);
            }
        }

        let analyzer = &mut self.analyzer;
        let output = &self.output;
        let analysis = panic::catch_unwind(AssertUnwindSafe(|| {
            analyzer.push_samples(output);
            analyzer.process()
        }));
        match analysis {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.stats.analysis_failures += 1;
                log::error!("spectrum analysis failed: {}", err);
            }
            Err(_) => {
                self.stats.analysis_failures += 1;
                log::error!("spectrum analysis panicked; resetting analyzer");
                self.analyzer.reset();
            }
        }

        self.writer
            .publish(&self.input, &self.output, &self.analyzer, self.sample_rate);

        if self.waterfall_dirty || flags.waterfall_request.swap(false, Ordering::AcqRel) {
            self.writer.publish_waterfall(&self.analyzer);
            self.waterfall_dirty = false;
        }

        self.stats.blocks += 1;
    }

    /// Publish the current waterfall outside the block loop
    pub fn publish_waterfall(&mut self) {
        self.writer.publish_waterfall(&self.analyzer);
        self.waterfall_dirty = false;
    }

    /// Forget a partially captured block
    pub fn discard_partial(&mut self) {
        self.filled = 0;
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn gate(&self) -> &NoiseGate {
        &self.gate
    }

    pub fn convolver(&self) -> &ConvolutionEngine {
        &self.convolver
    }

    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }
}
