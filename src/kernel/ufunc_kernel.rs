//! Kernels backed by a ufunc loop
//!
//! [`UfuncDeferredKernel`] pairs a matched loop with the resolved element
//! types. Instantiating it places a [`UfuncKernel`] into the arena, which
//! adapts engine calls to the loop's calling convention:
//!
//! ```text
//! engine:  dst, dst_stride, src[0..n], src_stride[0..n], count
//! loop:    args = [src[0], ..., src[n-1], dst]
//!          steps = [src_stride[0], ..., src_stride[n-1], dst_stride]
//!          dimensions = [count]
//! ```
//!
//! Single-element kernels pass zero strides and a count of one. Both the
//! deferred kernel and every kernel placed from it hold their own reference
//! to the ufunc object.

use super::{DeferredKernel, ExprKernel, FuncProto, KernelBuilder, KernelRequest};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::host::{GilGuard, Object, OwnedRef};
use crate::ufunc::{LoopData, LoopFn, LoopMatch, MAX_ARGS, Signature};
use std::fmt;
use std::os::raw::c_char;

/// Deferred kernel wrapping one built-in ufunc loop
pub struct UfuncDeferredKernel {
    ufunc: OwnedRef,
    func: LoopFn,
    data: LoopData,
    acquires_gil: bool,
    data_types: Vec<DType>,
}

impl UfuncDeferredKernel {
    /// Wrap the loop `found` of the ufunc behind `ufunc`
    ///
    /// `signature` is the engine-order signature the loop was matched with.
    /// `acquires_gil` marks the loop as needing the interpreter lock while it
    /// runs; it cannot be derived from the loop itself.
    pub fn new(
        ufunc: &Object,
        found: LoopMatch,
        signature: &Signature,
        acquires_gil: bool,
    ) -> Result<Self> {
        let inner = ufunc.as_ufunc().ok_or_else(|| {
            Error::type_mismatch("a ufunc object is required to wrap its loop", ufunc.repr())
        })?;
        if signature.arity() != inner.nargs() {
            return Err(Error::shape_mismatch(format!(
                "signature {signature} has the wrong size for ufunc '{}'",
                inner.name()
            )));
        }
        let data_types = signature
            .iter()
            .map(DType::from_type_num)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            ufunc = inner.name(),
            index = found.index,
            acquires_gil,
            "built deferred ufunc kernel"
        );
        Ok(Self {
            ufunc: OwnedRef::new(ufunc),
            func: found.func,
            data: found.data,
            acquires_gil,
            data_types,
        })
    }

    /// The wrapped ufunc object
    pub fn ufunc(&self) -> &Object {
        self.ufunc.get()
    }

    /// Whether placed kernels take the interpreter lock around the loop
    #[inline]
    pub fn acquires_gil(&self) -> bool {
        self.acquires_gil
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.data_types.len()
    }
}

impl DeferredKernel for UfuncDeferredKernel {
    fn funcproto(&self) -> FuncProto {
        FuncProto::ExprOperation
    }

    fn data_types(&self) -> &[DType] {
        &self.data_types
    }

    fn instantiate(
        &self,
        builder: &mut KernelBuilder,
        offset: usize,
        kerntype: u32,
    ) -> Result<usize> {
        // Taking the ufunc reference below needs the lock.
        let _gil = GilGuard::acquire();

        let size = std::mem::size_of::<UfuncKernel>();
        let end = offset
            .checked_add(size)
            .ok_or(Error::AllocationFailure {
                requested: usize::MAX,
            })?;
        builder.ensure_capacity(end)?;

        let request = KernelRequest::from_raw(kerntype)?;
        let variant = UfuncKernelVariant::select(request, self.acquires_gil);
        let kernel = UfuncKernel {
            variant,
            func: self.func,
            data: self.data,
            arity: self.arity(),
            ufunc: self.ufunc.clone(),
        };
        let end = builder.place(offset, kernel)?;
        tracing::debug!(offset, end, ?variant, "instantiated ufunc kernel");
        Ok(end)
    }
}

impl fmt::Debug for UfuncDeferredKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UfuncDeferredKernel")
            .field("ufunc", self.ufunc.get())
            .field("acquires_gil", &self.acquires_gil)
            .field("data_types", &self.data_types)
            .finish_non_exhaustive()
    }
}

/// Execution mode crossed with the interpreter-lock requirement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UfuncKernelVariant {
    SingleAcquireGil,
    SingleNoGil,
    StridedAcquireGil,
    StridedNoGil,
}

impl UfuncKernelVariant {
    pub fn select(request: KernelRequest, acquires_gil: bool) -> Self {
        match (request, acquires_gil) {
            (KernelRequest::Single, true) => Self::SingleAcquireGil,
            (KernelRequest::Single, false) => Self::SingleNoGil,
            (KernelRequest::Strided, true) => Self::StridedAcquireGil,
            (KernelRequest::Strided, false) => Self::StridedNoGil,
        }
    }

    pub fn request(self) -> KernelRequest {
        match self {
            Self::SingleAcquireGil | Self::SingleNoGil => KernelRequest::Single,
            Self::StridedAcquireGil | Self::StridedNoGil => KernelRequest::Strided,
        }
    }

    pub fn acquires_gil(self) -> bool {
        matches!(self, Self::SingleAcquireGil | Self::StridedAcquireGil)
    }
}

/// Arena-resident kernel calling a ufunc loop
pub struct UfuncKernel {
    variant: UfuncKernelVariant,
    func: LoopFn,
    data: LoopData,
    arity: usize,
    ufunc: OwnedRef,
}

impl UfuncKernel {
    #[inline]
    pub fn variant(&self) -> UfuncKernelVariant {
        self.variant
    }

    /// The ufunc object this kernel keeps alive
    pub fn ufunc(&self) -> &Object {
        self.ufunc.get()
    }

    fn expect_request(&self, request: KernelRequest) -> Result<()> {
        if self.variant.request() == request {
            Ok(())
        } else {
            Err(Error::invalid_request(
                "ufunc kernel call",
                format!(
                    "{request} call on a kernel instantiated for {} calls",
                    self.variant.request()
                ),
            ))
        }
    }

    fn source_count(&self, what: &'static str, got: usize) -> Result<usize> {
        let expected = self.arity - 1;
        if got < expected {
            return Err(Error::OperandCount {
                arity: self.arity,
                what,
                expected,
                got,
            });
        }
        Ok(expected)
    }

    /// Run the loop once over prepared argument and stride arrays
    ///
    /// # Safety
    /// The first `arity` entries of `args` and `steps` must describe operands
    /// valid for `count` elements of the loop's types.
    unsafe fn call(
        &self,
        args: &mut [*mut c_char; MAX_ARGS],
        steps: &mut [isize; MAX_ARGS],
        count: isize,
    ) {
        let mut dimensions = [count];
        let _gil = self.variant.acquires_gil().then(GilGuard::acquire);
        unsafe {
            (self.func)(
                args.as_mut_ptr(),
                dimensions.as_mut_ptr(),
                steps.as_mut_ptr(),
                self.data.as_ptr(),
            )
        }
    }
}

impl ExprKernel for UfuncKernel {
    fn request(&self) -> KernelRequest {
        self.variant.request()
    }

    unsafe fn single(&self, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        self.expect_request(KernelRequest::Single)?;
        let nsrc = self.source_count("source pointers", src.len())?;

        let mut args = [std::ptr::null_mut::<c_char>(); MAX_ARGS];
        for (slot, &ptr) in args.iter_mut().zip(&src[..nsrc]) {
            *slot = ptr as *mut c_char;
        }
        args[nsrc] = dst as *mut c_char;
        let mut steps = [0isize; MAX_ARGS];
        unsafe { self.call(&mut args, &mut steps, 1) };
        Ok(())
    }

    unsafe fn strided(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
    ) -> Result<()> {
        self.expect_request(KernelRequest::Strided)?;
        let nsrc = self.source_count("source pointers", src.len())?;
        self.source_count("source strides", src_stride.len())?;
        let count = isize::try_from(count)
            .map_err(|_| Error::invalid_request("ufunc kernel call", format!("count {count}")))?;

        let mut args = [std::ptr::null_mut::<c_char>(); MAX_ARGS];
        let mut steps = [0isize; MAX_ARGS];
        for (i, (&ptr, &stride)) in src.iter().zip(src_stride).take(nsrc).enumerate() {
            args[i] = ptr as *mut c_char;
            steps[i] = stride;
        }
        args[nsrc] = dst as *mut c_char;
        steps[nsrc] = dst_stride;
        unsafe { self.call(&mut args, &mut steps, count) };
        Ok(())
    }
}

impl fmt::Debug for UfuncKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UfuncKernel")
            .field("variant", &self.variant)
            .field("arity", &self.arity)
            .field("ufunc", self.ufunc.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::TypeNum;
    use crate::ufunc::loops::{BinaryOp, UnaryOp, binary_ufunc, unary_ufunc};
    use crate::ufunc::Ufunc;
    use crate::ufunc::matcher::match_signature;

    fn deferred(obj: &Object, signature: &[TypeNum], acquires_gil: bool) -> UfuncDeferredKernel {
        let sig = Signature::new(signature.to_vec());
        let found = match_signature(obj.as_ufunc().unwrap(), &sig).unwrap();
        UfuncDeferredKernel::new(obj, found, &sig, acquires_gil).unwrap()
    }

    #[test]
    fn test_variant_selection() {
        use UfuncKernelVariant::*;
        assert_eq!(UfuncKernelVariant::select(KernelRequest::Single, true), SingleAcquireGil);
        assert_eq!(UfuncKernelVariant::select(KernelRequest::Single, false), SingleNoGil);
        assert_eq!(UfuncKernelVariant::select(KernelRequest::Strided, true), StridedAcquireGil);
        assert_eq!(UfuncKernelVariant::select(KernelRequest::Strided, false), StridedNoGil);
        assert!(StridedAcquireGil.acquires_gil());
        assert!(!SingleNoGil.acquires_gil());
    }

    #[test]
    fn test_data_types_in_engine_order() {
        let obj = Object::ufunc(binary_ufunc(BinaryOp::Mul, &[DType::F32]).unwrap());
        let kernel = deferred(&obj, &[TypeNum::FLOAT; 3], false);
        assert_eq!(kernel.data_types(), &[DType::F32; 3]);
        assert_eq!(kernel.funcproto(), FuncProto::ExprOperation);
        assert_eq!(kernel.arity(), 3);
    }

    #[test]
    fn test_single_and_strided_calls() {
        let obj = Object::ufunc(binary_ufunc(BinaryOp::Sub, &[DType::I64]).unwrap());
        let int64 = DType::I64.type_num().unwrap();
        let kernel = deferred(&obj, &[int64; 3], false);
        let mut ckb = KernelBuilder::new();
        let end = kernel
            .instantiate(&mut ckb, 0, KernelRequest::Single.as_raw())
            .unwrap();
        kernel
            .instantiate(&mut ckb, end, KernelRequest::Strided.as_raw())
            .unwrap();

        let (a, b, mut out) = (10i64, 4i64, 0i64);
        let src = [&a as *const i64 as *const u8, &b as *const i64 as *const u8];
        unsafe {
            ckb.get(0)
                .unwrap()
                .single(&mut out as *mut i64 as *mut u8, &src)
                .unwrap();
        }
        assert_eq!(out, 6);

        // Broadcast the first operand with a zero stride.
        let xs = [1i64, 2, 3];
        let mut outs = [0i64; 3];
        let src = [&a as *const i64 as *const u8, xs.as_ptr() as *const u8];
        unsafe {
            ckb.get(end)
                .unwrap()
                .strided(outs.as_mut_ptr() as *mut u8, 8, &src, &[0, 8], 3)
                .unwrap();
        }
        assert_eq!(outs, [9, 8, 7]);
    }

    #[test]
    fn test_wrong_mode_and_missing_operands() {
        let obj = Object::ufunc(unary_ufunc(UnaryOp::Square, &[DType::F64]).unwrap());
        let kernel = deferred(&obj, &[TypeNum::DOUBLE; 2], true);
        let mut ckb = KernelBuilder::new();
        kernel.instantiate(&mut ckb, 0, KernelRequest::Single.as_raw()).unwrap();
        let placed = ckb.get(0).unwrap();

        let mut out = 0.0f64;
        let dst = &mut out as *mut f64 as *mut u8;
        let err = unsafe { placed.strided(dst, 8, &[dst as *const u8], &[8], 1) }.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));

        let err = unsafe { placed.single(dst, &[]) }.unwrap_err();
        assert_eq!(
            err,
            Error::OperandCount {
                arity: 2,
                what: "source pointers",
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn test_unresolvable_type_is_rejected() {
        let obj = Object::ufunc(
            Ufunc::builder("to_object", 1, 1)
                .add_loop(
                    &[TypeNum::DOUBLE, TypeNum::OBJECT],
                    crate::ufunc::loops::unary_loop::<f64>,
                    UnaryOp::Neg.loop_data(),
                )
                .build()
                .unwrap(),
        );
        let sig = Signature::new(vec![TypeNum::OBJECT, TypeNum::DOUBLE]);
        let found = match_signature(obj.as_ufunc().unwrap(), &sig).unwrap();
        let err = UfuncDeferredKernel::new(&obj, found, &sig, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTypeNum { .. }));
        assert_eq!(obj.ref_count(), 1);
    }

    #[test]
    fn test_references_change_only_under_lock() {
        use crate::host::gil;
        use crate::host::ref_log::{self, RefChange::*};

        ref_log::take();
        let obj = Object::ufunc(binary_ufunc(BinaryOp::Add, &[DType::F64]).unwrap());
        let kernel = deferred(&obj, &[TypeNum::DOUBLE; 3], false);
        assert_eq!(ref_log::take(), [(Increment, true)]);
        assert!(!gil::is_held());

        let mut ckb = KernelBuilder::new();
        let end = kernel.instantiate(&mut ckb, 0, 1).unwrap();
        kernel.instantiate(&mut ckb, end, 0).unwrap();
        assert_eq!(ref_log::take(), [(Increment, true), (Increment, true)]);
        assert!(!gil::is_held());

        // NoGil kernels and the descriptor still release under the lock,
        // including from a thread that never took it.
        let log = std::thread::spawn(move || {
            drop(ckb);
            drop(kernel);
            ref_log::take()
        })
        .join()
        .unwrap();
        assert_eq!(log, [(Decrement, true); 3]);
        assert_eq!(obj.ref_count(), 1);
    }
}
