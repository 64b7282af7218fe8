//! Error types for numr-ufunc

use crate::dtype::TypeNum;
use thiserror::Error;

/// Result type alias using numr-ufunc's Error
pub type Result<T> = std::result::Result<T, Error>;

/// What was wrong with a requested signature
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MismatchKind {
    /// The request was not a tuple
    Container,
    /// The request had the wrong number of entries
    Length,
    /// An entry could not be converted to a type descriptor
    Element,
}

/// Errors that can occur while bridging ufunc loops into numr kernels
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A handle was not of the expected object kind
    #[error("{context}, got {repr}")]
    TypeMismatch {
        /// What the caller required
        context: &'static str,
        /// Host representation of the offending object
        repr: String,
    },

    /// The ufunc declares a number of outputs other than one
    #[error("ufuncs with multiple return arguments are not supported (nout = {nout})")]
    UnsupportedArity {
        /// Declared output count
        nout: usize,
    },

    /// The ufunc loops take arrays as their data context
    #[error("ufuncs which require arrays as their data are not supported")]
    UnsupportedDataModel,

    /// A requested signature has the wrong shape or an unconvertible element
    #[error("{reason}")]
    ShapeMismatch {
        /// Description of the mismatch
        reason: String,
        /// Which part of the request was wrong
        kind: MismatchKind,
    },

    /// A feature of the ufunc that is not implemented by the bridge
    #[error("{feature} isn't implemented yet")]
    UnsupportedFeature {
        /// Description of the unsupported feature
        feature: &'static str,
    },

    /// No built-in loop matched the requested signature
    #[error("no loop of ufunc '{ufunc}' matches the signature {signature}{note}")]
    NoMatch {
        /// Ufunc name
        ufunc: String,
        /// Requested signature, engine order
        signature: String,
        /// Extra context appended to the message
        note: &'static str,
    },

    /// The kernel arena could not grow to the requested size
    #[error("Out of memory: failed to grow kernel buffer to {requested} bytes")]
    AllocationFailure {
        /// Requested capacity in bytes
        requested: usize,
    },

    /// A kernel was requested or invoked in a mode it does not support
    #[error("unsupported kernel request in {context}: {request}")]
    InvalidRequest {
        /// Where the request was rejected
        context: &'static str,
        /// The offending request
        request: String,
    },

    /// An external type number has no counterpart in the target type system
    #[error("type number {type_num} has no {target} equivalent")]
    UnsupportedTypeNum {
        /// The type number
        type_num: TypeNum,
        /// The type system that lacks it
        target: &'static str,
    },

    /// Too few operands were supplied to an instantiated kernel
    #[error("kernel of arity {arity} needs {expected} {what}, got {got}")]
    OperandCount {
        /// Kernel arity
        arity: usize,
        /// What was counted (source pointers, strides)
        what: &'static str,
        /// Required count
        expected: usize,
        /// Supplied count
        got: usize,
    },

    /// A ufunc definition is malformed
    #[error("invalid ufunc '{name}': {reason}")]
    InvalidUfunc {
        /// Ufunc name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a type mismatch error embedding the object's representation
    pub fn type_mismatch(context: &'static str, repr: impl Into<String>) -> Self {
        Self::TypeMismatch {
            context,
            repr: repr.into(),
        }
    }

    /// Create a shape mismatch error for a request of the wrong length
    pub fn shape_mismatch(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reason: reason.into(),
            kind: MismatchKind::Length,
        }
    }

    /// Create a shape mismatch error for a request that is not a tuple
    pub fn wrong_container(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reason: reason.into(),
            kind: MismatchKind::Container,
        }
    }

    /// Create a shape mismatch error for an entry that is not a data type
    pub fn unconvertible(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reason: reason.into(),
            kind: MismatchKind::Element,
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(context: &'static str, request: impl ToString) -> Self {
        Self::InvalidRequest {
            context,
            request: request.to_string(),
        }
    }

    /// Create an invalid ufunc error
    pub fn invalid_ufunc(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUfunc {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }
}
