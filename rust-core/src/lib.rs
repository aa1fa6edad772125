//! firscope - real-time FIR filtering and spectral analysis core
//!
//! Windowed-sinc filter design, a lock-free capture → gate → filter →
//! analyze pipeline, and optional Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod audio;
pub mod config;
pub mod filters;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use audio::{AudioPipeline, NoiseGateConfig, PipelineError, ResultSnapshot};
pub use config::PipelineConfig;
pub use filters::{design_filter, FilterCoefficients, FilterSpec, FilterType, WindowType};
pub use spectrum::{AnalysisConfig, SpectralAnalyzer};
