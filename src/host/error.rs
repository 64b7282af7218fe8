//! Host error indicator
//!
//! Host-facing entry points never unwind or return `Err` into host code.
//! They record a pending [`HostError`] on the calling thread and return
//! `None`, the way host C-API functions set an exception and return NULL.

use crate::error::{Error, MismatchKind, Result};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Host exception class a pending error is raised as
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    TypeError,
    ValueError,
    MemoryError,
    RuntimeError,
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::MemoryError => "MemoryError",
            Self::RuntimeError => "RuntimeError",
        };
        f.write_str(name)
    }
}

/// A pending host exception
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostError {
    kind: ExceptionKind,
    message: String,
    source: Option<Error>,
}

impl HostError {
    /// Create a host error that did not originate from a bridge [`Error`]
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Exception class
    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    /// Exception message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The bridge error this host error was translated from, if any
    pub fn source(&self) -> Option<&Error> {
        self.source.as_ref()
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<Error> for HostError {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::TypeMismatch { .. }
            | Error::UnsupportedArity { .. }
            | Error::UnsupportedDataModel
            | Error::UnsupportedTypeNum { .. } => ExceptionKind::TypeError,
            Error::ShapeMismatch {
                kind: MismatchKind::Container | MismatchKind::Element,
                ..
            } => ExceptionKind::TypeError,
            Error::ShapeMismatch {
                kind: MismatchKind::Length,
                ..
            }
            | Error::UnsupportedFeature { .. }
            | Error::NoMatch { .. }
            | Error::OperandCount { .. }
            | Error::InvalidUfunc { .. } => ExceptionKind::ValueError,
            Error::AllocationFailure { .. } => ExceptionKind::MemoryError,
            Error::InvalidRequest { .. } | Error::Internal(_) => ExceptionKind::RuntimeError,
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

thread_local! {
    static PENDING: RefCell<Option<HostError>> = const { RefCell::new(None) };
}

/// Set the calling thread's pending error, replacing any earlier one
pub fn set_error(err: impl Into<HostError>) {
    let err = err.into();
    tracing::debug!(kind = %err.kind, message = %err.message, "host error set");
    PENDING.with(|pending| *pending.borrow_mut() = Some(err));
}

/// Take the calling thread's pending error, clearing the indicator
pub fn take_error() -> Option<HostError> {
    PENDING.with(|pending| pending.borrow_mut().take())
}

/// Whether an error is pending on the calling thread
pub fn error_occurred() -> bool {
    PENDING.with(|pending| pending.borrow().is_some())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Run `f` at a host boundary
///
/// Returns `Some` on success. An `Err` or a panic escaping `f` is recorded
/// on the error indicator and `None` is returned; nothing unwinds past this
/// call.
pub fn translate_boundary<T>(f: impl FnOnce() -> Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            set_error(err);
            None
        }
        Err(payload) => {
            set_error(Error::Internal(panic_message(payload.as_ref())));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_roundtrip() {
        assert!(!error_occurred());
        set_error(HostError::new(ExceptionKind::ValueError, "bad"));
        assert!(error_occurred());
        let err = take_error().unwrap();
        assert_eq!(err.kind(), ExceptionKind::ValueError);
        assert_eq!(err.message(), "bad");
        assert!(!error_occurred());
        assert!(take_error().is_none());
    }

    #[test]
    fn test_boundary_translates_errors() {
        let out: Option<()> = translate_boundary(|| Err(Error::UnsupportedDataModel));
        assert!(out.is_none());
        let err = take_error().unwrap();
        assert_eq!(err.kind(), ExceptionKind::TypeError);
        assert_eq!(err.source(), Some(&Error::UnsupportedDataModel));
    }

    #[test]
    fn test_shape_mismatch_classes() {
        let kind = |err: Error| HostError::from(err).kind();
        assert_eq!(kind(Error::wrong_container("not a tuple")), ExceptionKind::TypeError);
        assert_eq!(kind(Error::unconvertible("not a type")), ExceptionKind::TypeError);
        assert_eq!(kind(Error::shape_mismatch("too short")), ExceptionKind::ValueError);
    }

    #[test]
    fn test_boundary_catches_panics() {
        let out: Option<u32> = translate_boundary(|| panic!("engine exploded"));
        assert!(out.is_none());
        let err = take_error().unwrap();
        assert_eq!(err.kind(), ExceptionKind::RuntimeError);
        assert!(err.message().contains("engine exploded"));
    }

    #[test]
    fn test_boundary_passes_values_through() {
        assert_eq!(translate_boundary(|| Ok(7)), Some(7));
        assert!(!error_occurred());
    }
}
