//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod filter_bindings;
mod processor_bindings;

/// Python module definition
#[pymodule]
fn firscope(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<processor_bindings::PyAudioProcessor>()?;
    m.add_class::<filter_bindings::PyFirDesigner>()?;

    m.add_class::<filter_bindings::PyWindowType>()?;
    m.add_class::<filter_bindings::PyFilterType>()?;

    Ok(())
}
