//! Generic strided loops in the external library's calling convention
//!
//! The external library ships a handful of generic loops whose opaque data
//! selects the operation. These are the numr CPU element-wise kernels
//! rewritten for arbitrary byte strides, so realistic ufuncs can be assembled
//! without linking the library itself.
//!
//! # Integer semantics
//!
//! Integer arithmetic wraps on overflow. Division by zero and `MIN / -1`
//! yield zero. Powers are exact, and a negative exponent truncates to zero
//! unless the base is 1 or -1. No operand can make a loop panic.

use super::{LoopData, LoopFn, Ufunc};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use std::os::raw::{c_char, c_void};

/// Element-wise binary operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Max,
    Min,
}

static BINARY_OPS: [BinaryOp; 7] = [
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Pow,
    BinaryOp::Max,
    BinaryOp::Min,
];

impl BinaryOp {
    /// Ufunc name of the operation
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "subtract",
            Self::Mul => "multiply",
            Self::Div => "divide",
            Self::Pow => "power",
            Self::Max => "maximum",
            Self::Min => "minimum",
        }
    }

    /// Loop data selecting this operation in [`binary_loop`]
    pub fn loop_data(self) -> LoopData {
        LoopData::from_static(&BINARY_OPS[self as usize])
    }

    #[inline]
    fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            Self::Add => a.wrapping_add(b),
            Self::Sub => a.wrapping_sub(b),
            Self::Mul => a.wrapping_mul(b),
            Self::Div => a.wrapping_div(b),
            Self::Pow => a.wrapping_pow(b),
            Self::Max => {
                if a > b {
                    a
                } else {
                    b
                }
            }
            Self::Min => {
                if a < b {
                    a
                } else {
                    b
                }
            }
        }
    }
}

/// Element-wise unary operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnaryOp {
    Neg,
    Abs,
    Square,
    Sqrt,
}

static UNARY_OPS: [UnaryOp; 4] = [UnaryOp::Neg, UnaryOp::Abs, UnaryOp::Square, UnaryOp::Sqrt];

impl UnaryOp {
    /// Ufunc name of the operation
    pub const fn name(self) -> &'static str {
        match self {
            Self::Neg => "negative",
            Self::Abs => "absolute",
            Self::Square => "square",
            Self::Sqrt => "sqrt",
        }
    }

    /// Loop data selecting this operation in [`unary_loop`]
    pub fn loop_data(self) -> LoopData {
        LoopData::from_static(&UNARY_OPS[self as usize])
    }

    #[inline]
    fn apply<T: Element>(self, a: T) -> T {
        match self {
            Self::Neg => a.wrapping_neg(),
            Self::Abs => a.wrapping_abs(),
            Self::Square => a.wrapping_mul(a),
            Self::Sqrt => T::from_f64(a.to_f64().sqrt()),
        }
    }
}

/// Strided binary loop: `out[i] = op(a[i], b[i])`
///
/// # Safety
/// - `args` holds three pointers (a, b, out), `steps` three byte strides
/// - each operand is valid for `dimensions[0]` elements of `T` at its stride
/// - `data` points at a [`BinaryOp`]
pub unsafe extern "C" fn binary_loop<T: Element>(
    args: *mut *mut c_char,
    dimensions: *mut isize,
    steps: *mut isize,
    data: *mut c_void,
) {
    unsafe {
        let op = *(data as *const BinaryOp);
        let n = *dimensions;
        let (mut a, mut b, mut out) = (*args, *args.add(1), *args.add(2));
        let (sa, sb, so) = (*steps, *steps.add(1), *steps.add(2));
        for _ in 0..n {
            let x = (a as *const T).read_unaligned();
            let y = (b as *const T).read_unaligned();
            (out as *mut T).write_unaligned(op.apply(x, y));
            a = a.wrapping_offset(sa);
            b = b.wrapping_offset(sb);
            out = out.wrapping_offset(so);
        }
    }
}

/// Strided unary loop: `out[i] = op(a[i])`
///
/// # Safety
/// - `args` holds two pointers (a, out), `steps` two byte strides
/// - each operand is valid for `dimensions[0]` elements of `T` at its stride
/// - `data` points at a [`UnaryOp`]
pub unsafe extern "C" fn unary_loop<T: Element>(
    args: *mut *mut c_char,
    dimensions: *mut isize,
    steps: *mut isize,
    data: *mut c_void,
) {
    unsafe {
        let op = *(data as *const UnaryOp);
        let n = *dimensions;
        let (mut a, mut out) = (*args, *args.add(1));
        let (sa, so) = (*steps, *steps.add(1));
        for _ in 0..n {
            let x = (a as *const T).read_unaligned();
            (out as *mut T).write_unaligned(op.apply(x));
            a = a.wrapping_offset(sa);
            out = out.wrapping_offset(so);
        }
    }
}

macro_rules! loop_for_dtype {
    ($loop:ident, $dtype:expr) => {
        match $dtype {
            DType::F64 => Some($loop::<f64> as LoopFn),
            DType::F32 => Some($loop::<f32> as LoopFn),
            #[cfg(feature = "f16")]
            DType::F16 => Some($loop::<half::f16> as LoopFn),
            DType::I64 => Some($loop::<i64> as LoopFn),
            DType::I32 => Some($loop::<i32> as LoopFn),
            DType::I16 => Some($loop::<i16> as LoopFn),
            DType::I8 => Some($loop::<i8> as LoopFn),
            DType::U64 => Some($loop::<u64> as LoopFn),
            DType::U32 => Some($loop::<u32> as LoopFn),
            DType::U16 => Some($loop::<u16> as LoopFn),
            DType::U8 => Some($loop::<u8> as LoopFn),
            _ => None,
        }
    };
}

/// [`binary_loop`] instantiated for `dtype`, if numr has an element type for it
pub fn binary_loop_for(dtype: DType) -> Option<LoopFn> {
    loop_for_dtype!(binary_loop, dtype)
}

/// [`unary_loop`] instantiated for `dtype`, if numr has an element type for it
pub fn unary_loop_for(dtype: DType) -> Option<LoopFn> {
    loop_for_dtype!(unary_loop, dtype)
}

fn loop_entry(
    name: &str,
    dtype: DType,
    lookup: fn(DType) -> Option<LoopFn>,
) -> Result<(crate::dtype::TypeNum, LoopFn)> {
    let type_num = dtype
        .type_num()
        .ok_or_else(|| Error::invalid_ufunc(name, format!("{dtype} has no type number")))?;
    let func =
        lookup(dtype).ok_or_else(|| Error::invalid_ufunc(name, format!("no loop for {dtype}")))?;
    Ok((type_num, func))
}

/// Two-input ufunc with one `(t, t) -> t` loop per dtype, in the given order
pub fn binary_ufunc(op: BinaryOp, dtypes: &[DType]) -> Result<Ufunc> {
    let mut builder = Ufunc::builder(op.name(), 2, 1);
    for &dtype in dtypes {
        let (t, func) = loop_entry(op.name(), dtype, binary_loop_for)?;
        builder = builder.add_loop(&[t, t, t], func, op.loop_data());
    }
    builder.build()
}

/// One-input ufunc with one `t -> t` loop per dtype, in the given order
pub fn unary_ufunc(op: UnaryOp, dtypes: &[DType]) -> Result<Ufunc> {
    let mut builder = Ufunc::builder(op.name(), 1, 1);
    for &dtype in dtypes {
        let (t, func) = loop_entry(op.name(), dtype, unary_loop_for)?;
        builder = builder.add_loop(&[t, t], func, op.loop_data());
    }
    builder.build()
}
