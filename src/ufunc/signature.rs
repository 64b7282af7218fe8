//! Type signatures of ufunc loops
//!
//! The external library lists a loop's types inputs first, output last. The
//! engine lists the output first. A [`Signature`] always holds engine order:
//!
//! ```text
//! external:  [in0, in1, ..., out]
//! engine:    [out, in0, in1, ...]
//! ```

use super::Ufunc;
use crate::dtype::{Descr, TypeNum};
use crate::error::{Error, Result};
use crate::host::Object;
use std::fmt;

/// Element types of one loop, engine order (output, then inputs)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature(Vec<TypeNum>);

impl Signature {
    /// Wrap types already in engine order
    pub fn new(types: Vec<TypeNum>) -> Self {
        Self(types)
    }

    /// Reorder external-order types (inputs, output) into engine order
    pub fn from_external_order(types: impl IntoIterator<Item = TypeNum>) -> Self {
        let mut types: Vec<TypeNum> = types.into_iter().collect();
        if !types.is_empty() {
            types.rotate_right(1);
        }
        Self(types)
    }

    /// Number of arguments, inputs plus output
    #[inline]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    /// Output type
    #[inline]
    pub fn output(&self) -> Option<TypeNum> {
        self.0.first().copied()
    }

    /// Input types, in order
    #[inline]
    pub fn inputs(&self) -> &[TypeNum] {
        self.0.get(1..).unwrap_or(&[])
    }

    #[inline]
    pub fn as_slice(&self) -> &[TypeNum] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeNum> + '_ {
        self.0.iter().copied()
    }

    /// Types in external order (inputs, output)
    pub fn to_external_order(&self) -> Vec<TypeNum> {
        let mut types = self.0.clone();
        if !types.is_empty() {
            types.rotate_left(1);
        }
        types
    }

    /// Whether this signature equals an external-order row of type codes
    pub fn matches_external(&self, row: &[u8]) -> bool {
        let Some((&last, rest)) = row.split_last() else {
            return self.0.is_empty();
        };
        self.0.len() == row.len()
            && self.0[0] == TypeNum::from(last)
            && self.0[1..]
                .iter()
                .zip(rest)
                .all(|(&req, &code)| req == TypeNum::from(code))
    }

    /// Host tuple of descriptors, engine order
    pub fn to_descr_tuple(&self) -> Result<Object> {
        let items = self
            .iter()
            .map(|num| Descr::from_type_num(num).map(Object::descr))
            .collect::<Result<Vec<_>>>()?;
        Ok(Object::tuple(items))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, num) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match Descr::from_type_num(*num) {
                Ok(descr) => write!(f, "{descr}")?,
                Err(_) => write!(f, "{num}")?,
            }
        }
        f.write_str(")")
    }
}

/// Every signature of `ufunc`, engine order
///
/// Built-in loops come first in table order, followed by user-registered
/// loops in registration order, each chain walked head to tail.
pub fn ufunc_signatures(ufunc: &Ufunc) -> Vec<Signature> {
    let mut out: Vec<Signature> = (0..ufunc.ntypes())
        .map(|i| {
            let row = ufunc.loop_types(i).iter().map(|&code| TypeNum::from(code));
            Signature::from_external_order(row)
        })
        .collect();
    if let Some(userloops) = ufunc.user_loops() {
        for (_, capsule) in userloops.iter() {
            for node in capsule.iter() {
                out.push(Signature::from_external_order(node.arg_types().iter().copied()));
            }
        }
    }
    out
}

/// Signatures of the ufunc behind a host handle
pub fn try_signatures(obj: &Object) -> Result<Vec<Signature>> {
    let ufunc = obj.as_ufunc().ok_or_else(|| {
        Error::type_mismatch("a ufunc object is required to retrieve type tuples", obj.repr())
    })?;
    Ok(ufunc_signatures(ufunc))
}
