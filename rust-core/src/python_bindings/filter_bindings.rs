//! Python bindings for FIR filter design

use crate::filters::design::{magnitude_response_db, MAX_FILTER_LENGTH};
use crate::filters::{design_filter, FilterSpec, FilterType, WindowType};
use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Window type enum exposed to Python
#[pyclass(name = "WindowType")]
#[derive(Clone, Copy)]
pub enum PyWindowType {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl From<PyWindowType> for WindowType {
    fn from(py_win: PyWindowType) -> Self {
        match py_win {
            PyWindowType::Rectangular => WindowType::Rectangular,
            PyWindowType::Hann => WindowType::Hann,
            PyWindowType::Hamming => WindowType::Hamming,
            PyWindowType::Blackman => WindowType::Blackman,
        }
    }
}

/// Filter type enum exposed to Python
#[pyclass(name = "FilterType")]
#[derive(Clone, Copy)]
pub enum PyFilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

impl From<PyFilterType> for FilterType {
    fn from(py_kind: PyFilterType) -> Self {
        match py_kind {
            PyFilterType::Lowpass => FilterType::Lowpass,
            PyFilterType::Highpass => FilterType::Highpass,
            PyFilterType::Bandpass => FilterType::Bandpass,
        }
    }
}

/// Stateless windowed-sinc designer
#[pyclass(name = "FirDesigner")]
pub struct PyFirDesigner;

#[pymethods]
impl PyFirDesigner {
    #[new]
    fn new() -> Self {
        Self
    }

    /// Design FIR taps
    ///
    /// Args:
    ///     kind: FilterType
    ///     omega_c1: Lower cutoff (normalized, units of π)
    ///     omega_c2: Upper cutoff (normalized, units of π)
    ///     transition_width: Transition width (radians)
    ///     window: WindowType
    ///
    /// Returns:
    ///     Filter taps as numpy array
    #[staticmethod]
    fn design<'py>(
        py: Python<'py>,
        kind: PyFilterType,
        omega_c1: f64,
        omega_c2: f64,
        transition_width: f64,
        window: PyWindowType,
    ) -> PyResult<&'py PyArray1<f64>> {
        let spec = FilterSpec::new(kind.into(), omega_c1, omega_c2, transition_width, window.into());
        let coefficients =
            design_filter(&spec).map_err(|e| PyValueError::new_err(e.to_string()))?;

        Ok(PyArray1::from_vec(py, coefficients.taps().to_vec()))
    }

    /// Taps for the Part A reference bandpass (0.4π to 0.6π, Δω = 0.05π)
    #[staticmethod]
    fn design_part_a<'py>(py: Python<'py>, window: PyWindowType) -> PyResult<&'py PyArray1<f64>> {
        let coefficients = design_filter(&FilterSpec::from_part_a(window.into()))
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        Ok(PyArray1::from_vec(py, coefficients.taps().to_vec()))
    }

    /// Filter length the design would produce, without designing it
    #[staticmethod]
    fn filter_length(
        kind: PyFilterType,
        omega_c1: f64,
        omega_c2: f64,
        transition_width: f64,
        window: PyWindowType,
    ) -> PyResult<usize> {
        FilterSpec::new(kind.into(), omega_c1, omega_c2, transition_width, window.into())
            .filter_length()
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Magnitude response in dB of `taps` at normalized `frequencies`
    #[staticmethod]
    fn magnitude_response_db<'py>(
        py: Python<'py>,
        taps: PyReadonlyArray1<f64>,
        frequencies: PyReadonlyArray1<f64>,
    ) -> PyResult<&'py PyArray1<f64>> {
        let response = magnitude_response_db(taps.as_slice()?, frequencies.as_slice()?);
        Ok(PyArray1::from_vec(py, response))
    }

    /// Nominal stopband attenuation in dB of a design with `window`
    #[staticmethod]
    fn stopband_attenuation_db(window: PyWindowType) -> f64 {
        WindowType::from(window).stopband_attenuation_db()
    }

    #[classattr]
    fn max_filter_length() -> usize {
        MAX_FILTER_LENGTH
    }
}
