//! Property-based tests for signature discovery and matching

use numr_ufunc::api::{try_build_kernel, try_signatures};
use numr_ufunc::dtype::{Descr, TypeNum};
use numr_ufunc::error::Error;
use numr_ufunc::host::Object;
use numr_ufunc::ufunc::{LoopData, Signature, Ufunc};
use proptest::prelude::*;
use std::os::raw::{c_char, c_void};

unsafe extern "C" fn noop(_: *mut *mut c_char, _: *mut isize, _: *mut isize, _: *mut c_void) {}

const POOL: [TypeNum; 8] = [
    TypeNum::BOOL,
    TypeNum::BYTE,
    TypeNum::UBYTE,
    TypeNum::SHORT,
    TypeNum::INT,
    TypeNum::LONGLONG,
    TypeNum::FLOAT,
    TypeNum::DOUBLE,
];

/// (nin, loop rows in external order)
fn loop_table() -> impl Strategy<Value = (usize, Vec<Vec<TypeNum>>)> {
    (1usize..4).prop_flat_map(|nin| {
        let row = prop::collection::vec(prop::sample::select(POOL.to_vec()), nin + 1);
        (Just(nin), prop::collection::vec(row, 1..6))
    })
}

fn build(nin: usize, rows: &[Vec<TypeNum>]) -> Object {
    let builder = rows.iter().fold(Ufunc::builder("prop", nin, 1), |b, row| {
        b.add_loop(row, noop, LoopData::NULL)
    });
    Object::ufunc(builder.build().unwrap())
}

fn descr_tuple(sig: &Signature) -> Object {
    Object::tuple(
        sig.iter()
            .map(|num| Object::descr(Descr::from_type_num(num).unwrap())),
    )
}

proptest! {
    #[test]
    fn prop_signatures_put_last_slot_first((nin, rows) in loop_table()) {
        let ufunc = build(nin, &rows);
        let sigs = try_signatures(&ufunc).unwrap();
        prop_assert_eq!(sigs.len(), rows.len());
        for (sig, row) in sigs.iter().zip(&rows) {
            prop_assert_eq!(sig.arity(), nin + 1);
            prop_assert_eq!(sig.output(), row.last().copied());
            prop_assert_eq!(sig.inputs(), &row[..nin]);
            prop_assert_eq!(&sig.to_external_order(), row);
        }
    }

    #[test]
    fn prop_listed_signatures_match((nin, rows) in loop_table()) {
        let ufunc = build(nin, &rows);
        for sig in try_signatures(&ufunc).unwrap() {
            let kernel = try_build_kernel(&ufunc, &descr_tuple(&sig), false).unwrap();
            prop_assert_eq!(kernel.arity(), nin + 1);
        }
        prop_assert_eq!(ufunc.ref_count(), 1);
    }

    #[test]
    fn prop_unlisted_signatures_do_not_match(
        (nin, rows) in loop_table(),
        pick in prop::collection::vec(prop::sample::select(POOL.to_vec()), 4),
    ) {
        let ufunc = build(nin, &rows);
        let requested = Signature::new(pick[..=nin].to_vec());
        let listed = try_signatures(&ufunc).unwrap();
        prop_assume!(!listed.contains(&requested));

        let err = try_build_kernel(&ufunc, &descr_tuple(&requested), false).unwrap_err();
        prop_assert!(matches!(err, Error::NoMatch { .. }), "unexpected error: {err}");
    }
}
