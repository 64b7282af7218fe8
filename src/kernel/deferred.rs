use super::{DeferredKernel, FuncProto, KernelBuilder};
use crate::dtype::DType;
use crate::error::Result;
use std::fmt;

/// Type-erased deferred kernel, as held by the engine
///
/// Dropping the container frees the kernel it holds.
pub struct CkernelDeferred {
    inner: Box<dyn DeferredKernel>,
}

impl CkernelDeferred {
    pub fn new<K: DeferredKernel + 'static>(kernel: K) -> Self {
        Self {
            inner: Box::new(kernel),
        }
    }

    #[inline]
    pub fn funcproto(&self) -> FuncProto {
        self.inner.funcproto()
    }

    /// Number of operands, output included
    #[inline]
    pub fn arity(&self) -> usize {
        self.inner.data_types().len()
    }

    /// Element types, engine order (output, then inputs)
    #[inline]
    pub fn data_types(&self) -> &[DType] {
        self.inner.data_types()
    }

    /// Place a kernel for `kerntype` at `offset` in `builder`
    pub fn instantiate(
        &self,
        builder: &mut KernelBuilder,
        offset: usize,
        kerntype: u32,
    ) -> Result<usize> {
        self.inner.instantiate(builder, offset, kerntype)
    }

    /// Release the deferred kernel now
    pub fn free(self) {
        drop(self);
    }
}

impl fmt::Debug for CkernelDeferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CkernelDeferred")
            .field("funcproto", &self.funcproto())
            .field("data_types", &self.data_types())
            .finish()
    }
}
