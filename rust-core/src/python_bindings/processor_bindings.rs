//! Python bindings for the audio pipeline
//!
//! All processing happens on the Rust DSP thread; Python only issues
//! control calls and polls for results.

use super::filter_bindings::{PyFilterType, PyWindowType};
use crate::audio::{AudioPipeline, NoiseGateConfig, PipelineError, PipelineState};
use crate::config::PipelineConfig;
use crate::filters::{FilterSpec, FilterType};
use crate::spectrum::AnalysisConfig;
use numpy::PyArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(err: PipelineError) -> PyErr {
    match err {
        PipelineError::Design(_) | PipelineError::Config(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Audio processor exposed to Python
#[pyclass(name = "AudioProcessor", unsendable)]
pub struct PyAudioProcessor {
    pipeline: AudioPipeline,
}

#[pymethods]
impl PyAudioProcessor {
    /// Create a processor, optionally from a TOML config file
    #[new]
    #[pyo3(signature = (config_path = None))]
    fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => PipelineConfig::load(path).map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => PipelineConfig::default(),
        };
        let pipeline = AudioPipeline::new(config).map_err(to_py_err)?;
        Ok(Self { pipeline })
    }

    /// Start audio capture and processing
    ///
    /// Returns:
    ///     Device name as string
    fn start(&mut self) -> PyResult<String> {
        self.pipeline
            .start()
            .map(|info| info.device_name)
            .map_err(to_py_err)
    }

    /// Stop audio processing
    fn stop(&mut self) {
        self.pipeline.stop();
    }

    /// True while the DSP thread is running
    fn is_running(&self) -> bool {
        self.pipeline.state() == PipelineState::Running
    }

    /// (device_name, sample_rate, channels) of the running stream
    fn stream_info(&self) -> Option<(String, u32, u16)> {
        self.pipeline
            .stream_info()
            .map(|info| (info.device_name.clone(), info.sample_rate, info.channels))
    }

    /// Device error that ended the last run, if any
    fn take_error(&mut self) -> Option<String> {
        self.pipeline.take_error().map(|e| e.to_string())
    }

    /// Design and apply new filter
    ///
    /// Args:
    ///     omega_c1: Lower cutoff (normalized, units of π)
    ///     omega_c2: Upper cutoff (normalized, units of π)
    ///     transition_width: Transition width (radians)
    ///     window: WindowType
    ///     kind: FilterType, Bandpass when omitted
    ///
    /// Returns:
    ///     Tuple of (filter_length, group_delay)
    #[pyo3(signature = (omega_c1, omega_c2, transition_width, window, kind = None))]
    fn design_filter(
        &mut self,
        omega_c1: f64,
        omega_c2: f64,
        transition_width: f64,
        window: PyWindowType,
        kind: Option<PyFilterType>,
    ) -> PyResult<(usize, f64)> {
        let kind = kind.map(FilterType::from).unwrap_or_default();
        let spec = FilterSpec::new(kind, omega_c1, omega_c2, transition_width, window.into());
        self.pipeline
            .design_filter(&spec)
            .map(|summary| (summary.length, summary.group_delay))
            .map_err(to_py_err)
    }

    /// Set filter bypass state
    fn set_bypass(&self, bypass: bool) {
        self.pipeline.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.pipeline.is_bypassed()
    }

    /// Enable audio monitoring (WARNING: Use headphones!)
    fn enable_monitoring(&mut self) -> PyResult<()> {
        self.pipeline.enable_monitoring().map_err(to_py_err)
    }

    /// Disable audio monitoring
    fn disable_monitoring(&mut self) {
        self.pipeline.disable_monitoring();
    }

    /// Check if monitoring is enabled
    fn is_monitoring(&self) -> bool {
        self.pipeline.is_monitoring()
    }

    /// Update FFT configuration; clears the waterfall
    #[pyo3(signature = (fft_size, window, apply_correction = true))]
    fn update_analysis_config(
        &mut self,
        fft_size: usize,
        window: PyWindowType,
        apply_correction: bool,
    ) -> PyResult<()> {
        self.pipeline
            .update_analysis_config(AnalysisConfig {
                fft_size,
                window: window.into(),
                apply_correction,
            })
            .map_err(to_py_err)
    }

    /// Older name of `update_analysis_config`, kept for existing callers
    fn update_fft_config(&mut self, fft_size: usize, window: PyWindowType) -> PyResult<()> {
        self.update_analysis_config(fft_size, window, true)
    }

    /// Configure noise gate
    ///
    /// Args:
    ///     enabled: Enable or disable the noise gate
    ///     threshold_db: Threshold in dB (e.g., -40.0)
    ///     attack_ms: Attack time in milliseconds (e.g., 10.0)
    ///     release_ms: Release time in milliseconds (e.g., 100.0)
    fn configure_noise_gate(
        &mut self,
        enabled: bool,
        threshold_db: f64,
        attack_ms: f64,
        release_ms: f64,
    ) -> PyResult<()> {
        self.pipeline
            .configure_noise_gate(NoiseGateConfig {
                enabled,
                threshold_db,
                attack_ms,
                release_ms,
            })
            .map_err(to_py_err)
    }

    /// Get latest processing results
    ///
    /// Returns:
    ///     Dictionary with keys: 'sequence', 'input_waveform',
    ///     'filtered_waveform', 'spectrum_magnitude', 'spectrum_frequencies',
    ///     'sample_rate', or None before the first block
    fn get_results(&self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        let Some(results) = self.pipeline.get_results() else {
            return Ok(None);
        };

        let dict = PyDict::new(py);
        dict.set_item("sequence", results.sequence)?;
        dict.set_item("input_waveform", PyArray1::from_vec(py, results.input_waveform))?;
        dict.set_item("filtered_waveform", PyArray1::from_vec(py, results.filtered_waveform))?;
        dict.set_item(
            "spectrum_magnitude",
            PyArray1::from_vec(py, results.spectrum_magnitude_db),
        )?;
        dict.set_item(
            "spectrum_frequencies",
            PyArray1::from_vec(py, results.spectrum_frequencies),
        )?;
        dict.set_item("sample_rate", results.sample_rate)?;

        Ok(Some(dict.into()))
    }

    /// Waterfall history, rows oldest first
    ///
    /// Returns:
    ///     Tuple of (list of numpy rows, numpy frequencies) or None
    fn get_waterfall(&mut self, py: Python<'_>) -> Option<(Vec<PyObject>, PyObject)> {
        self.pipeline.get_waterfall().map(|waterfall| {
            let rows: Vec<PyObject> = waterfall
                .rows
                .into_iter()
                .map(|row| PyArray1::from_vec(py, row).into())
                .collect();
            let frequencies: PyObject = PyArray1::from_vec(py, waterfall.frequencies).into();
            (rows, frequencies)
        })
    }

    fn clear_waterfall(&mut self) -> PyResult<()> {
        self.pipeline.clear_waterfall().map_err(to_py_err)
    }

    /// List available capture devices; callable on the class
    #[staticmethod]
    fn list_devices() -> PyResult<Vec<String>> {
        AudioPipeline::list_devices().map_err(to_py_err)
    }

    /// Capture from the named device on the next start; None for the default
    #[pyo3(signature = (name = None))]
    fn select_input_device(&mut self, name: Option<&str>) -> PyResult<()> {
        let descriptor = match name {
            Some(name) => Some(
                self.pipeline
                    .input_devices()
                    .map_err(to_py_err)?
                    .into_iter()
                    .find(|device| device.name == name)
                    .ok_or_else(|| PyValueError::new_err(format!("no capture device '{}'", name)))?,
            ),
            None => None,
        };
        self.pipeline.select_input_device(descriptor).map_err(to_py_err)
    }
}
