//! Reference-counted host objects

use super::gil::GilGuard;
use crate::dtype::Descr;
use crate::error::{Error, Result};
use crate::kernel::CkernelDeferred;
use crate::ufunc::Ufunc;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// Payload of a host object
pub enum ObjectKind {
    None,
    Int(i64),
    Str(String),
    Tuple(Vec<Object>),
    List(Vec<Object>),
    Descr(Descr),
    Ufunc(Ufunc),
    Kernel(CkernelDeferred),
}

/// A strong reference to a host object
///
/// Cloning increments the object's reference count and dropping decrements
/// it; the payload is freed with the last reference. Holders that outlive a
/// host call should keep an [`OwnedRef`], which performs both under the
/// interpreter lock.
#[derive(Clone)]
pub struct Object(Arc<ObjectKind>);

impl Object {
    /// Wrap a payload in a fresh object with a reference count of one
    pub fn new(kind: ObjectKind) -> Self {
        Self(Arc::new(kind))
    }

    pub fn none() -> Self {
        Self::new(ObjectKind::None)
    }

    pub fn int(value: i64) -> Self {
        Self::new(ObjectKind::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ObjectKind::Str(value.into()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Object>) -> Self {
        Self::new(ObjectKind::Tuple(items.into_iter().collect()))
    }

    pub fn list(items: impl IntoIterator<Item = Object>) -> Self {
        Self::new(ObjectKind::List(items.into_iter().collect()))
    }

    pub fn descr(descr: Descr) -> Self {
        Self::new(ObjectKind::Descr(descr))
    }

    pub fn ufunc(ufunc: Ufunc) -> Self {
        Self::new(ObjectKind::Ufunc(ufunc))
    }

    pub fn kernel(kernel: CkernelDeferred) -> Self {
        Self::new(ObjectKind::Kernel(kernel))
    }

    /// Payload
    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.0
    }

    /// Number of strong references currently held to this object
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether two handles refer to the same object
    #[inline]
    pub fn is(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_ufunc(&self) -> Option<&Ufunc> {
        match self.kind() {
            ObjectKind::Ufunc(ufunc) => Some(ufunc),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Object]> {
        match self.kind() {
            ObjectKind::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Object]> {
        match self.kind() {
            ObjectKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_descr(&self) -> Option<&Descr> {
        match self.kind() {
            ObjectKind::Descr(descr) => Some(descr),
            _ => None,
        }
    }

    pub fn as_kernel(&self) -> Option<&CkernelDeferred> {
        match self.kind() {
            ObjectKind::Kernel(kernel) => Some(kernel),
            _ => None,
        }
    }

    /// Host representation, as embedded in error messages
    pub fn repr(&self) -> String {
        match self.kind() {
            ObjectKind::None => "None".to_owned(),
            ObjectKind::Int(value) => value.to_string(),
            ObjectKind::Str(value) => format!("'{value}'"),
            ObjectKind::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            ObjectKind::Tuple(items) => format!("({})", join_reprs(items)),
            ObjectKind::List(items) => format!("[{}]", join_reprs(items)),
            ObjectKind::Descr(descr) => descr.repr(),
            ObjectKind::Ufunc(ufunc) => format!("<ufunc '{}'>", ufunc.name()),
            ObjectKind::Kernel(kernel) => format!("<ckernel_deferred arity={}>", kernel.arity()),
        }
    }
}

fn join_reprs(items: &[Object]) -> String {
    items.iter().map(Object::repr).collect::<Vec<_>>().join(", ")
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<Descr> for Object {
    fn from(descr: Descr) -> Self {
        Self::descr(descr)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::str(value)
    }
}

/// A strong reference owned by bridge state that outlives a host call
///
/// The increment on creation and the decrement on drop both happen under
/// the interpreter lock, whichever thread performs them.
pub struct OwnedRef(ManuallyDrop<Object>);

impl OwnedRef {
    /// Take a new strong reference to `obj`
    pub fn new(obj: &Object) -> Self {
        let _gil = GilGuard::acquire();
        #[cfg(test)]
        ref_log::record(ref_log::RefChange::Increment);
        Self(ManuallyDrop::new(obj.clone()))
    }

    /// The referenced object
    #[inline]
    pub fn get(&self) -> &Object {
        &self.0
    }
}

impl Clone for OwnedRef {
    fn clone(&self) -> Self {
        Self::new(&self.0)
    }
}

impl Drop for OwnedRef {
    fn drop(&mut self) {
        let _gil = GilGuard::acquire();
        #[cfg(test)]
        ref_log::record(ref_log::RefChange::Decrement);
        // SAFETY: the object is dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.0) }
    }
}

impl fmt::Debug for OwnedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedRef").field(self.get()).finish()
    }
}


/// Convert a host object to a type descriptor
///
/// Accepts descriptor objects and strings understood by [`Descr`]'s
/// `FromStr` implementation.
pub fn descr_converter(obj: &Object) -> Result<Descr> {
    match obj.kind() {
        ObjectKind::Descr(descr) => Ok(descr.clone()),
        ObjectKind::Str(s) => s.parse(),
        _ => Err(Error::unconvertible(format!(
            "cannot interpret {} as a data type",
            obj.repr()
        ))),
    }
}
