//! Deferred and instantiated kernels
//!
//! The engine builds computation in two stages. A deferred kernel knows its
//! element types but not how it will be called; instantiating it for an
//! execution mode places a callable kernel into a caller-owned arena.
//!
//! # Architecture
//!
//! ```text
//! CkernelDeferred (generic container, owned by the engine)
//! └── Box<dyn DeferredKernel>
//!         │ instantiate(builder, offset, kerntype)
//!         ▼
//! KernelBuilder (arena)
//! ├── offset 0:  Box<dyn ExprKernel>
//! ├── offset n:  Box<dyn ExprKernel>
//! └── ...        dropped in reverse placement order
//! ```

pub mod builder;
mod deferred;
pub mod ufunc_kernel;

pub use builder::KernelBuilder;
pub use deferred::CkernelDeferred;
pub use ufunc_kernel::{UfuncDeferredKernel, UfuncKernel, UfuncKernelVariant};

use crate::dtype::DType;
use crate::error::{Error, Result};
use std::fmt;

/// Raw request code for a single-element kernel
pub const KERNEL_REQUEST_SINGLE: u32 = 0;
/// Raw request code for a strided-loop kernel
pub const KERNEL_REQUEST_STRIDED: u32 = 1;

/// Execution mode a kernel is instantiated for
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelRequest {
    /// One element per call, operands addressed directly
    Single,
    /// `count` elements per call, operands advanced by byte strides
    Strided,
}

impl KernelRequest {
    /// Decode a raw request code
    pub fn from_raw(kerntype: u32) -> Result<Self> {
        match kerntype {
            KERNEL_REQUEST_SINGLE => Ok(Self::Single),
            KERNEL_REQUEST_STRIDED => Ok(Self::Strided),
            other => Err(Error::invalid_request("instantiate", other)),
        }
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Single => KERNEL_REQUEST_SINGLE,
            Self::Strided => KERNEL_REQUEST_STRIDED,
        }
    }
}

impl TryFrom<u32> for KernelRequest {
    type Error = Error;

    fn try_from(kerntype: u32) -> Result<Self> {
        Self::from_raw(kerntype)
    }
}

impl fmt::Display for KernelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Strided => f.write_str("strided"),
        }
    }
}

/// Calling protocol of the kernels a deferred kernel produces
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FuncProto {
    /// Output plus `arity - 1` inputs, element-wise
    ExprOperation,
}

/// An instantiated, callable element-wise kernel
///
/// Operand order follows the engine convention: one destination, then the
/// sources in input order.
pub trait ExprKernel: Send {
    /// Mode this kernel was instantiated for
    fn request(&self) -> KernelRequest;

    /// Compute one element
    ///
    /// # Safety
    /// `dst` and every pointer in `src` must be valid for one element of the
    /// kernel's corresponding type.
    unsafe fn single(&self, dst: *mut u8, src: &[*const u8]) -> Result<()>;

    /// Compute `count` elements
    ///
    /// # Safety
    /// `dst` and every pointer in `src` must be valid for `count` elements
    /// at the matching byte stride.
    unsafe fn strided(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
    ) -> Result<()>;
}

/// A kernel that has not been specialized for an execution mode yet
pub trait DeferredKernel: Send + Sync {
    fn funcproto(&self) -> FuncProto;

    /// Element types, engine order (output, then inputs)
    fn data_types(&self) -> &[DType];

    /// Place a kernel for `kerntype` at `offset` in `builder`
    ///
    /// Returns the offset just past the placed kernel.
    fn instantiate(
        &self,
        builder: &mut KernelBuilder,
        offset: usize,
        kerntype: u32,
    ) -> Result<usize>;
}
