//! # numr-ufunc
//!
//! **Deferred numr kernels built from external ufunc loop tables.**
//!
//! An external array library describes each universal function (ufunc) as a
//! table of type-specialized native loops. numr-ufunc picks the loop matching
//! a requested element-type signature and wraps it as a deferred kernel that
//! the engine later instantiates for single-element or strided execution.
//!
//! ## Pipeline
//!
//! ```text
//! host ufunc object ──signatures_for──▶ [(out, in0, in1, ...), ...]
//!        │
//!        └──build_kernel(type_tuple, acquires_gil)
//!                 │  check nout / data model, convert tuple, first exact match
//!                 ▼
//!          CkernelDeferred (UfuncDeferredKernel)
//!                 │  instantiate(builder, offset, kerntype)
//!                 ▼
//!          KernelBuilder ── UfuncKernel { Single|Strided × AcquireGil|NoGil }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use numr_ufunc::prelude::*;
//! use numr_ufunc::ufunc::loops::{BinaryOp, binary_ufunc};
//!
//! let add = Object::ufunc(binary_ufunc(BinaryOp::Add, &[DType::I32, DType::F64])?);
//! let types = Object::tuple(["float64", "float64", "float64"].map(Object::from));
//! let kernel = try_build_kernel(&add, &types, false)?;
//!
//! let mut ckb = KernelBuilder::new();
//! kernel.instantiate(&mut ckb, 0, KERNEL_REQUEST_STRIDED)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `python`: use the CPython GIL and convert errors into `pyo3::PyErr`
//! - `f16`: half-precision element types (F16, BF16)

#![warn(clippy::all)]

pub mod api;
pub mod dtype;
pub mod error;
pub mod host;
pub mod kernel;
pub mod ufunc;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{build_kernel, signatures_for, try_build_kernel, try_signatures};
    pub use crate::dtype::{DType, Descr, TypeNum};
    pub use crate::error::{Error, Result};
    pub use crate::host::{GilGuard, Object, take_error};
    pub use crate::kernel::{
        CkernelDeferred, ExprKernel, KERNEL_REQUEST_SINGLE, KERNEL_REQUEST_STRIDED,
        KernelBuilder, KernelRequest,
    };
    pub use crate::ufunc::{Signature, Ufunc};
}
