//! Selecting the built-in loop for a requested signature
//!
//! Matching is exact and first-wins over the built-in loop table. Loops
//! registered for user types are listed by [`super::signature::ufunc_signatures`]
//! but never matched here.

use super::signature::Signature;
use super::{LoopData, LoopFn, Ufunc};
use crate::error::{Error, Result};
use crate::host::{Object, descr_converter};

/// A built-in loop chosen for a requested signature
#[derive(Copy, Clone, Debug)]
pub struct LoopMatch {
    /// Row of the loop in the ufunc's built-in table
    pub index: usize,
    pub func: LoopFn,
    pub data: LoopData,
}

/// Reject ufunc shapes the bridge cannot wrap, before looking at any loop
pub fn check_supported(ufunc: &Ufunc) -> Result<()> {
    if ufunc.nout() != 1 {
        return Err(Error::UnsupportedArity { nout: ufunc.nout() });
    }
    if ufunc.uses_arrays_as_data() {
        return Err(Error::UnsupportedDataModel);
    }
    Ok(())
}

/// Convert a host type tuple into an engine-order signature for `ufunc`
pub fn requested_signature(ufunc: &Ufunc, type_tuple: &Object) -> Result<Signature> {
    let items = type_tuple
        .as_tuple()
        .ok_or_else(|| Error::wrong_container("type_tuple must be a tuple"))?;
    if items.len() != ufunc.nargs() {
        return Err(Error::shape_mismatch(format!(
            "type_tuple has the wrong size for the ufunc (expected {}, got {})",
            ufunc.nargs(),
            items.len()
        )));
    }

    let types = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            descr_converter(item)
                .map(|descr| descr.type_num())
                .map_err(|err| Error::unconvertible(format!("type_tuple[{i}]: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Signature::new(types))
}

/// Find the first built-in loop whose types equal `requested`
///
/// `requested` is in engine order; loop rows are in external order.
pub fn match_signature(ufunc: &Ufunc, requested: &Signature) -> Result<LoopMatch> {
    for index in 0..ufunc.ntypes() {
        if !requested.matches_external(ufunc.loop_types(index)) {
            continue;
        }
        if ufunc.core_enabled() {
            return Err(Error::UnsupportedFeature { feature: "gufunc" });
        }
        let data = ufunc.loop_data(index).ok_or(Error::UnsupportedDataModel)?;
        tracing::debug!(ufunc = ufunc.name(), index, signature = %requested, "matched loop");
        return Ok(LoopMatch {
            index,
            func: ufunc.loop_function(index),
            data,
        });
    }

    let note = if ufunc.user_loops().is_some() {
        "; converting user-registered loops isn't implemented"
    } else {
        ""
    };
    tracing::debug!(ufunc = ufunc.name(), signature = %requested, "no loop matched");
    Err(Error::NoMatch {
        ufunc: ufunc.name().to_owned(),
        signature: requested.to_string(),
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::TypeNum;
    use crate::error::MismatchKind;
    use std::os::raw::{c_char, c_void};

    unsafe extern "C" fn first(_: *mut *mut c_char, _: *mut isize, _: *mut isize, _: *mut c_void) {}
    unsafe extern "C" fn second(_: *mut *mut c_char, _: *mut isize, _: *mut isize, _: *mut c_void) {}

    fn mixed() -> Ufunc {
        Ufunc::builder("mixed", 2, 1)
            .add_loop(&[TypeNum::INT; 3], first, LoopData::NULL)
            .add_loop(
                &[TypeNum::FLOAT, TypeNum::INT, TypeNum::DOUBLE],
                second,
                LoopData::NULL,
            )
            .add_loop(
                &[TypeNum::FLOAT, TypeNum::INT, TypeNum::DOUBLE],
                first,
                LoopData::NULL,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_match_swaps_output_to_front() {
        let ufunc = mixed();
        let req = Signature::new(vec![TypeNum::DOUBLE, TypeNum::FLOAT, TypeNum::INT]);
        let found = match_signature(&ufunc, &req).unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.func as usize, second as usize);
    }

    #[test]
    fn test_external_order_request_misses() {
        let ufunc = mixed();
        let req = Signature::new(vec![TypeNum::FLOAT, TypeNum::INT, TypeNum::DOUBLE]);
        let err = match_signature(&ufunc, &req).unwrap_err();
        assert!(matches!(err, Error::NoMatch { note: "", .. }));
        assert_eq!(
            err.to_string(),
            "no loop of ufunc 'mixed' matches the signature (float32, int32, float64)"
        );
    }

    #[test]
    fn test_requested_signature_checks_shape() {
        let ufunc = mixed();
        let not_tuple = requested_signature(&ufunc, &Object::list([])).unwrap_err();
        assert_eq!(not_tuple.to_string(), "type_tuple must be a tuple");
        assert!(matches!(
            not_tuple,
            Error::ShapeMismatch {
                kind: MismatchKind::Container,
                ..
            }
        ));

        let short = Object::tuple([Object::str("int32")]);
        let err = requested_signature(&ufunc, &short).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("type_tuple has the wrong size for the ufunc")
        );
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                kind: MismatchKind::Length,
                ..
            }
        ));

        let bad = Object::tuple([Object::str("int32"), Object::int(1), Object::str("int32")]);
        let err = requested_signature(&ufunc, &bad).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                kind: MismatchKind::Element,
                ..
            }
        ));
        assert!(err.to_string().starts_with("type_tuple[1]:"));
    }

    #[test]
    fn test_check_supported() {
        let two_out = Ufunc::builder("divmod", 2, 2).build().unwrap();
        assert_eq!(
            check_supported(&two_out),
            Err(Error::UnsupportedArity { nout: 2 })
        );
        let arrays = Ufunc::builder("f", 1, 1).uses_arrays_as_data().build().unwrap();
        assert_eq!(check_supported(&arrays), Err(Error::UnsupportedDataModel));
        assert_eq!(check_supported(&mixed()), Ok(()));
    }
}
