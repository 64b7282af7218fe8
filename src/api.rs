//! Host-facing entry points
//!
//! The `try_` functions return typed errors for Rust callers. The plain
//! functions follow the host calling convention: they never panic or return
//! an error into host code, and instead set the host error indicator and
//! return `None`.

use crate::error::{Error, Result};
use crate::host::{GilGuard, Object, translate_boundary};
use crate::kernel::{CkernelDeferred, UfuncDeferredKernel};
use crate::ufunc::matcher::{check_supported, match_signature, requested_signature};

pub use crate::ufunc::signature::try_signatures;

/// List every type signature of a ufunc, engine order
///
/// Returns a host list with one tuple of descriptors per loop: built-in
/// loops first, then loops registered for user types.
pub fn signatures_for(ufunc: &Object) -> Option<Object> {
    translate_boundary(|| {
        let signatures = try_signatures(ufunc)?;
        let tuples = signatures
            .iter()
            .map(|sig| sig.to_descr_tuple())
            .collect::<Result<Vec<_>>>()?;
        Ok(Object::list(tuples))
    })
}

/// Build a deferred kernel for the loop of `ufunc` matching `type_tuple`
///
/// `type_tuple` lists the element types in engine order (output first).
/// `acquires_gil` makes every instantiated kernel hold the interpreter lock
/// while the loop runs.
pub fn try_build_kernel(
    ufunc: &Object,
    type_tuple: &Object,
    acquires_gil: bool,
) -> Result<CkernelDeferred> {
    let _gil = GilGuard::acquire();

    let inner = ufunc.as_ufunc().ok_or_else(|| {
        Error::type_mismatch(
            "a ufunc object is required by this function to create a ckernel_deferred",
            ufunc.repr(),
        )
    })?;
    check_supported(inner)?;
    let requested = requested_signature(inner, type_tuple)?;
    let found = match_signature(inner, &requested)?;
    let kernel = UfuncDeferredKernel::new(ufunc, found, &requested, acquires_gil)?;
    Ok(CkernelDeferred::new(kernel))
}

/// Host-convention [`try_build_kernel`], returning the kernel as a host object
pub fn build_kernel(ufunc: &Object, type_tuple: &Object, acquires_gil: bool) -> Option<Object> {
    translate_boundary(|| try_build_kernel(ufunc, type_tuple, acquires_gil).map(Object::kernel))
}
