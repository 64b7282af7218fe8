//! CPython integration (requires the "python" feature)
//!
//! Pending bridge errors become Python exceptions of the matching class.

use super::error::{ExceptionKind, HostError, take_error};
use crate::error::Error;
use pyo3::PyErr;
use pyo3::Python;
use pyo3::exceptions::{PyMemoryError, PyRuntimeError, PyTypeError, PyValueError};

impl From<HostError> for PyErr {
    fn from(err: HostError) -> Self {
        let message = err.message().to_owned();
        match err.kind() {
            ExceptionKind::TypeError => PyTypeError::new_err(message),
            ExceptionKind::ValueError => PyValueError::new_err(message),
            ExceptionKind::MemoryError => PyMemoryError::new_err(message),
            ExceptionKind::RuntimeError => PyRuntimeError::new_err(message),
        }
    }
}

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        HostError::from(err).into()
    }
}

/// Move the calling thread's pending bridge error into the interpreter
///
/// Returns true if an error was pending.
pub fn restore_pending(py: Python<'_>) -> bool {
    match take_error() {
        Some(err) => {
            PyErr::from(err).restore(py);
            true
        }
        None => false,
    }
}
