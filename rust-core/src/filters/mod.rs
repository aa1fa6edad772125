//! FIR filter design and real-time filtering

pub mod design;
pub mod fast_fir;
pub mod fir;
pub mod windows;

pub use design::{design_filter, DesignError, FilterCoefficients, FilterSpec, FilterType};
pub use fir::ConvolutionEngine;
pub use windows::{generate_window, WindowType};
