//! Result publication from the audio thread
//!
//! Snapshots go through a triple buffer: the audio thread fills the back
//! buffer in place and publishes it, readers take the newest one. Buffers are
//! sized for the largest block and spectrum up front, so publishing never
//! allocates.

use crate::config::MAX_BLOCK_SIZE;
use crate::spectrum::{SpectralAnalyzer, WaterfallSnapshot, MAX_SPECTRUM_SIZE, WATERFALL_CAPACITY};
use std::sync::Mutex;
use triple_buffer::TripleBuffer;

/// In-place storage for one published result
#[derive(Debug)]
pub struct SnapshotFrame {
    /// 0 means nothing published yet
    pub sequence: u64,
    pub sample_rate: f64,
    pub input_waveform: Vec<f64>,
    pub filtered_waveform: Vec<f64>,
    pub spectrum_frequencies: Vec<f64>,
    pub spectrum_magnitude_db: Vec<f64>,
}

impl SnapshotFrame {
    pub fn with_capacity(waveform: usize, spectrum: usize) -> Self {
        Self {
            sequence: 0,
            sample_rate: 0.0,
            input_waveform: Vec::with_capacity(waveform),
            filtered_waveform: Vec::with_capacity(waveform),
            spectrum_frequencies: Vec::with_capacity(spectrum),
            spectrum_magnitude_db: Vec::with_capacity(spectrum),
        }
    }
}

/// `Vec::clone` only keeps `len` worth of capacity; the triple buffer clones
/// the initial frame into all three slots, and each must keep the full size
impl Clone for SnapshotFrame {
    fn clone(&self) -> Self {
        fn copy(source: &Vec<f64>) -> Vec<f64> {
            let mut out = Vec::with_capacity(source.capacity());
            out.extend_from_slice(source);
            out
        }

        Self {
            sequence: self.sequence,
            sample_rate: self.sample_rate,
            input_waveform: copy(&self.input_waveform),
            filtered_waveform: copy(&self.filtered_waveform),
            spectrum_frequencies: copy(&self.spectrum_frequencies),
            spectrum_magnitude_db: copy(&self.spectrum_magnitude_db),
        }
    }
}

/// Latest processing results handed to readers
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSnapshot {
    /// Increases by one per processed block
    pub sequence: u64,
    pub input_waveform: Vec<f64>,
    pub filtered_waveform: Vec<f64>,
    pub spectrum_frequencies: Vec<f64>,
    pub spectrum_magnitude_db: Vec<f64>,
    pub sample_rate: f64,
}

impl From<&SnapshotFrame> for ResultSnapshot {
    fn from(frame: &SnapshotFrame) -> Self {
        Self {
            sequence: frame.sequence,
            input_waveform: frame.input_waveform.clone(),
            filtered_waveform: frame.filtered_waveform.clone(),
            spectrum_frequencies: frame.spectrum_frequencies.clone(),
            spectrum_magnitude_db: frame.spectrum_magnitude_db.clone(),
            sample_rate: frame.sample_rate,
        }
    }
}

/// Flattened waterfall storage, `rows * row_len` values oldest row first
#[derive(Debug)]
pub struct WaterfallFrame {
    pub sequence: u64,
    pub rows: usize,
    pub row_len: usize,
    pub frequencies: Vec<f64>,
    pub data: Vec<f64>,
}

impl WaterfallFrame {
    fn with_capacity(rows: usize, row_len: usize) -> Self {
        Self {
            sequence: 0,
            rows: 0,
            row_len: 0,
            frequencies: Vec::with_capacity(row_len),
            data: Vec::with_capacity(rows * row_len),
        }
    }

    fn to_snapshot(&self) -> WaterfallSnapshot {
        let rows = if self.row_len == 0 {
            Vec::new()
        } else {
            self.data
                .chunks_exact(self.row_len)
                .take(self.rows)
                .map(|row| row.to_vec())
                .collect()
        };

        WaterfallSnapshot {
            rows,
            frequencies: self.frequencies.clone(),
        }
    }
}

impl Clone for WaterfallFrame {
    fn clone(&self) -> Self {
        let mut frame = Self::with_capacity(0, 0);
        frame.sequence = self.sequence;
        frame.rows = self.rows;
        frame.row_len = self.row_len;
        frame.frequencies.reserve_exact(self.frequencies.capacity());
        frame.frequencies.extend_from_slice(&self.frequencies);
        frame.data.reserve_exact(self.data.capacity());
        frame.data.extend_from_slice(&self.data);
        frame
    }
}

/// Audio-thread end
pub struct SnapshotWriter {
    results: triple_buffer::Input<SnapshotFrame>,
    waterfall: triple_buffer::Input<WaterfallFrame>,
    sequence: u64,
    waterfall_sequence: u64,
}

impl SnapshotWriter {
    /// Fill the back buffer from this block and publish it
    pub fn publish(
        &mut self,
        input: &[f64],
        filtered: &[f64],
        analyzer: &SpectralAnalyzer,
        sample_rate: f64,
    ) {
        self.sequence += 1;

        let frame = self.results.input_buffer_mut();
        frame.sequence = self.sequence;
        frame.sample_rate = sample_rate;
        refill(&mut frame.input_waveform, input);
        refill(&mut frame.filtered_waveform, filtered);
        refill(&mut frame.spectrum_frequencies, analyzer.frequencies());
        refill(&mut frame.spectrum_magnitude_db, analyzer.magnitude_db());

        self.results.publish();
    }

    /// Copy the analyzer's waterfall history and publish it
    pub fn publish_waterfall(&mut self, analyzer: &SpectralAnalyzer) {
        self.waterfall_sequence += 1;

        let history = analyzer.waterfall();
        let frame = self.waterfall.input_buffer_mut();
        frame.sequence = self.waterfall_sequence;
        frame.rows = history.len();
        frame.row_len = history.row_len();
        refill(&mut frame.frequencies, analyzer.frequencies());
        history.copy_flat_into(&mut frame.data);

        self.waterfall.publish();
    }

    /// Blocks published so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[inline]
fn refill(dest: &mut Vec<f64>, source: &[f64]) {
    dest.clear();
    dest.extend_from_slice(source);
}

/// Reader end, shareable between control-side callers
pub struct SnapshotReader {
    results: Mutex<triple_buffer::Output<SnapshotFrame>>,
    waterfall: Mutex<triple_buffer::Output<WaterfallFrame>>,
}

impl SnapshotReader {
    /// Newest published snapshot, left in place for later readers
    pub fn latest(&self) -> Option<ResultSnapshot> {
        let mut output = self.results.lock().ok()?;
        let frame = output.read();
        if frame.sequence == 0 {
            return None;
        }
        Some(ResultSnapshot::from(&*frame))
    }

    /// Newest published waterfall copy
    pub fn latest_waterfall(&self) -> Option<WaterfallSnapshot> {
        let mut output = self.waterfall.lock().ok()?;
        let frame = output.read();
        if frame.sequence == 0 {
            return None;
        }
        Some(frame.to_snapshot())
    }
}

/// Create a writer/reader pair sized for the largest block and spectrum
pub fn snapshot_channel() -> (SnapshotWriter, SnapshotReader) {
    let (results_in, results_out) =
        TripleBuffer::new(&SnapshotFrame::with_capacity(MAX_BLOCK_SIZE, MAX_SPECTRUM_SIZE)).split();
    let (waterfall_in, waterfall_out) = TripleBuffer::new(&WaterfallFrame::with_capacity(
        WATERFALL_CAPACITY,
        MAX_SPECTRUM_SIZE,
    ))
    .split();

    (
        SnapshotWriter {
            results: results_in,
            waterfall: waterfall_in,
            sequence: 0,
            waterfall_sequence: 0,
        },
        SnapshotReader {
            results: Mutex::new(results_out),
            waterfall: Mutex::new(waterfall_out),
        },
    )
}
