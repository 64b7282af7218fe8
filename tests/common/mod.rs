//! Common test utilities
#![allow(dead_code)]

use numr_ufunc::dtype::TypeNum;
use numr_ufunc::host::{HostError, Object, gil, take_error};
use numr_ufunc::ufunc::{LoopData, Ufunc};
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};

/// Observations of a [`recording_add`] loop
///
/// Each test declares its own `static` recorder so parallel tests don't
/// share counters.
pub struct Recorder {
    calls: AtomicUsize,
    last_count: AtomicIsize,
    gil_held: AtomicBool,
}

impl Recorder {
    pub const fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_count: AtomicIsize::new(-1),
            gil_held: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_count(&self) -> isize {
        self.last_count.load(Ordering::SeqCst)
    }

    /// Whether the interpreter lock was held during the last call
    pub fn gil_held(&self) -> bool {
        self.gil_held.load(Ordering::SeqCst)
    }
}

/// int32 addition loop that records each call in the `Recorder` behind `data`
pub unsafe extern "C" fn recording_add(
    args: *mut *mut c_char,
    dimensions: *mut isize,
    steps: *mut isize,
    data: *mut c_void,
) {
    unsafe {
        let rec = &*(data as *const Recorder);
        let n = *dimensions;
        rec.calls.fetch_add(1, Ordering::SeqCst);
        rec.last_count.store(n, Ordering::SeqCst);
        rec.gil_held.store(gil::is_held(), Ordering::SeqCst);

        let (mut a, mut b, mut out) = (*args, *args.add(1), *args.add(2));
        for _ in 0..n {
            let x = (a as *const i32).read_unaligned();
            let y = (b as *const i32).read_unaligned();
            (out as *mut i32).write_unaligned(x.wrapping_add(y));
            a = a.wrapping_offset(*steps);
            b = b.wrapping_offset(*steps.add(1));
            out = out.wrapping_offset(*steps.add(2));
        }
    }
}

/// A 2-in/1-out ufunc with a single `(int32, int32) -> int32` loop
pub fn int32_add(rec: &'static Recorder) -> Object {
    Object::ufunc(
        Ufunc::builder("add", 2, 1)
            .add_loop(&[TypeNum::INT; 3], recording_add, LoopData::from_static(rec))
            .build()
            .unwrap(),
    )
}

/// Host tuple of type names
pub fn type_tuple(names: &[&str]) -> Object {
    Object::tuple(names.iter().map(|&name| Object::from(name)))
}

/// Take the pending host error, failing the test if there is none
pub fn expect_host_error() -> HostError {
    take_error().expect("a host error should be pending")
}

/// Byte pointer to a value, as passed to kernels
pub fn src_ptr<T>(value: &T) -> *const u8 {
    value as *const T as *const u8
}
