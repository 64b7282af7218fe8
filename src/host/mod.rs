//! Host scripting runtime model
//!
//! The bridge is called from a dynamically-typed host runtime. This module
//! models the parts of that runtime the bridge touches:
//!
//! ```text
//! host
//! ├── Object / ObjectKind   reference-counted host values (ufuncs, tuples, descrs, kernels)
//! ├── OwnedRef              a strong reference taken and released under the lock
//! ├── gil                   scoped interpreter-lock acquisition
//! └── error                 per-thread error indicator and boundary translation
//! ```
//!
//! With the `python` feature the lock is the CPython GIL and pending errors
//! convert into `pyo3::PyErr`.

pub mod error;
pub mod gil;
mod object;
#[cfg(feature = "python")]
pub mod python;

pub use error::{
    ExceptionKind, HostError, error_occurred, set_error, take_error, translate_boundary,
};
pub use gil::GilGuard;
pub use object::{Object, ObjectKind, OwnedRef, descr_converter};
#[cfg(test)]
pub(crate) use object::ref_log;
