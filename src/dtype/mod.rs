//! Element type systems on both sides of the bridge
//!
//! numr kernels are typed by [`DType`], the engine's native element type. The
//! external ufunc library numbers its element types with [`TypeNum`] and
//! describes them with [`Descr`]. Loop signatures arrive as type numbers and
//! are resolved to `DType`s when a deferred kernel is built.

mod element;
pub mod type_num;

pub use element::Element;
pub use type_num::{Descr, TypeNum, register_user_type};

use crate::error::{Error, Result};
use std::fmt;
use std::os::raw::c_long;

/// Element types of numr kernels
///
/// # Discriminant Values (Serialization Stability)
///
/// The discriminant values are **stable** for serialization purposes:
/// - Floats: 0-9 (F64=0, F32=1, F16=2, BF16=3)
/// - Signed ints: 10-19 (I64=10, I32=11, I16=12, I8=13)
/// - Unsigned ints: 20-29 (U64=20, U32=21, U16=22, U8=23)
/// - Bool: 30
/// - Complex: 40-49 (Complex64=40, Complex128=41)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 16-bit floating point (IEEE 754)
    F16 = 2,
    /// 16-bit brain floating point
    BF16 = 3,

    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 16-bit signed integer
    I16 = 12,
    /// 8-bit signed integer
    I8 = 13,

    /// 64-bit unsigned integer
    U64 = 20,
    /// 32-bit unsigned integer
    U32 = 21,
    /// 16-bit unsigned integer
    U16 = 22,
    /// 8-bit unsigned integer
    U8 = 23,

    /// Boolean type
    Bool = 30,

    /// 64-bit complex (two f32: re, im)
    Complex64 = 40,
    /// 128-bit complex (two f64: re, im)
    Complex128 = 41,
}

/// Whether the platform `long` is 64 bits wide
const LONG_IS_64: bool = std::mem::size_of::<c_long>() == 8;

impl DType {
    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::I16 => "i16",
            Self::I8 => "i8",
            Self::U64 => "u64",
            Self::U32 => "u32",
            Self::U16 => "u16",
            Self::U8 => "u8",
            Self::Bool => "bool",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }

    /// Resolve an external type number to the engine's element type
    ///
    /// Only fixed-size numeric and boolean types have a numr counterpart.
    /// Object, string, datetime, long double and user-defined types fail
    /// with [`Error::UnsupportedTypeNum`].
    pub fn from_type_num(type_num: TypeNum) -> Result<Self> {
        let dtype = match type_num {
            TypeNum::BOOL => Self::Bool,
            TypeNum::BYTE => Self::I8,
            TypeNum::UBYTE => Self::U8,
            TypeNum::SHORT => Self::I16,
            TypeNum::USHORT => Self::U16,
            TypeNum::INT => Self::I32,
            TypeNum::UINT => Self::U32,
            TypeNum::LONG if LONG_IS_64 => Self::I64,
            TypeNum::LONG => Self::I32,
            TypeNum::ULONG if LONG_IS_64 => Self::U64,
            TypeNum::ULONG => Self::U32,
            TypeNum::LONGLONG => Self::I64,
            TypeNum::ULONGLONG => Self::U64,
            TypeNum::FLOAT => Self::F32,
            TypeNum::DOUBLE => Self::F64,
            TypeNum::CFLOAT => Self::Complex64,
            TypeNum::CDOUBLE => Self::Complex128,
            TypeNum::HALF => Self::F16,
            _ => {
                return Err(Error::UnsupportedTypeNum {
                    type_num,
                    target: "numr dtype",
                });
            }
        };
        Ok(dtype)
    }

    /// The canonical external type number for this element type
    ///
    /// Returns `None` for types the external library cannot represent (BF16).
    pub const fn type_num(self) -> Option<TypeNum> {
        let num = match self {
            Self::Bool => TypeNum::BOOL,
            Self::I8 => TypeNum::BYTE,
            Self::U8 => TypeNum::UBYTE,
            Self::I16 => TypeNum::SHORT,
            Self::U16 => TypeNum::USHORT,
            Self::I32 => TypeNum::INT,
            Self::U32 => TypeNum::UINT,
            Self::I64 if LONG_IS_64 => TypeNum::LONG,
            Self::I64 => TypeNum::LONGLONG,
            Self::U64 if LONG_IS_64 => TypeNum::ULONG,
            Self::U64 => TypeNum::ULONGLONG,
            Self::F32 => TypeNum::FLOAT,
            Self::F64 => TypeNum::DOUBLE,
            Self::F16 => TypeNum::HALF,
            Self::Complex64 => TypeNum::CFLOAT,
            Self::Complex128 => TypeNum::CDOUBLE,
            Self::BF16 => return None,
        };
        Some(num)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_num_resolution() {
        assert_eq!(DType::from_type_num(TypeNum::INT).unwrap(), DType::I32);
        assert_eq!(DType::from_type_num(TypeNum::DOUBLE).unwrap(), DType::F64);
        assert_eq!(DType::from_type_num(TypeNum::LONGLONG).unwrap(), DType::I64);
        assert_eq!(DType::from_type_num(TypeNum::HALF).unwrap(), DType::F16);
        assert_eq!(
            DType::from_type_num(TypeNum::CDOUBLE).unwrap(),
            DType::Complex128
        );
    }

    #[test]
    fn test_unrepresentable_type_nums() {
        for num in [
            TypeNum::OBJECT,
            TypeNum::STRING,
            TypeNum::LONGDOUBLE,
            TypeNum::DATETIME,
            TypeNum(300),
        ] {
            assert!(matches!(
                DType::from_type_num(num),
                Err(Error::UnsupportedTypeNum { .. })
            ));
        }
    }

    #[test]
    fn test_type_num_roundtrip_for_engine_types() {
        for dtype in [
            DType::Bool,
            DType::I8,
            DType::U16,
            DType::I32,
            DType::U64,
            DType::F32,
            DType::F64,
            DType::Complex64,
        ] {
            let num = dtype.type_num().unwrap();
            assert_eq!(DType::from_type_num(num).unwrap(), dtype);
        }
        assert_eq!(DType::BF16.type_num(), None);
    }
}
