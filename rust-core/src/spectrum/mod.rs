//! Spectral analysis with FFT

pub mod analysis;
pub mod fft;
pub mod waterfall;
pub mod windowing;

pub use analysis::{AnalysisConfig, SpectralAnalyzer, DB_FLOOR, MAX_SPECTRUM_SIZE};
pub use fft::{AnalysisError, FftEngine};
pub use waterfall::{WaterfallHistory, WaterfallSnapshot, WATERFALL_CAPACITY};
pub use windowing::apply_window;
