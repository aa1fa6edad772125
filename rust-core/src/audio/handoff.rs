//! Lock-free message passing between the control and audio threads
//!
//! Commands travel control → audio and are drained at block boundaries.
//! Whatever the audio thread displaces travels back on the retire queue so
//! it is dropped (and freed) on the control thread.

use super::buffer::AudioProducer;
use crate::audio::gate::NoiseGateConfig;
use crate::filters::fir::{PreparedFilter, RetiredKernel};
use crate::spectrum::SpectralAnalyzer;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Control → audio requests
pub enum EngineCommand {
    /// Swap in new taps at the next block boundary
    SetFilter(PreparedFilter),

    ConfigureGate(NoiseGateConfig),

    /// Replace the analyzer; built on the control thread
    ConfigureAnalysis(Box<SpectralAnalyzer>),

    ClearWaterfall,

    /// Start feeding the monitor output ring
    AttachMonitor(AudioProducer),

    DetachMonitor,
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::SetFilter(_) => "set-filter",
            EngineCommand::ConfigureGate(_) => "configure-gate",
            EngineCommand::ConfigureAnalysis(_) => "configure-analysis",
            EngineCommand::ClearWaterfall => "clear-waterfall",
            EngineCommand::AttachMonitor(_) => "attach-monitor",
            EngineCommand::DetachMonitor => "detach-monitor",
        }
    }
}

/// Audio → control: values the audio thread must not drop itself
pub enum Retired {
    Kernel(RetiredKernel),
    Analyzer(Box<SpectralAnalyzer>),
    Monitor(AudioProducer),
}

/// Control-thread end
pub struct ControlLink {
    commands: HeapProducer<EngineCommand>,
    retired: HeapConsumer<Retired>,
}

/// Audio-thread end
pub struct EngineLink {
    commands: HeapConsumer<EngineCommand>,
    retired: HeapProducer<Retired>,
}

/// Create both ends; the retire queue gets twice the command capacity
/// since one command can displace at most one value
pub fn link(capacity: usize) -> (ControlLink, EngineLink) {
    let capacity = capacity.max(1);
    let (command_tx, command_rx) = HeapRb::new(capacity).split();
    let (retired_tx, retired_rx) = HeapRb::new(capacity * 2).split();

    (
        ControlLink {
            commands: command_tx,
            retired: retired_rx,
        },
        EngineLink {
            commands: command_rx,
            retired: retired_tx,
        },
    )
}

impl ControlLink {
    /// Queue a command; hands it back if the queue is full
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.commands.push(command)
    }

    /// Drop everything the audio thread has retired
    pub fn reclaim(&mut self) -> usize {
        let mut count = 0;
        while let Some(item) = self.retired.pop() {
            drop(item);
            count += 1;
        }
        count
    }

    /// Commands not yet picked up by the audio thread
    pub fn pending(&self) -> usize {
        self.commands.len()
    }
}

impl EngineLink {
    pub fn next_command(&mut self) -> Option<EngineCommand> {
        self.commands.pop()
    }

    /// Hand `item` back for reclamation
    ///
    /// If the control thread has fallen so far behind that the queue is
    /// full, the item is dropped here instead.
    pub fn retire(&mut self, item: Retired) {
        if let Err(item) = self.retired.push(item) {
            log::warn!("retire queue full; releasing on the audio thread");
            drop(item);
        }
    }
}
