//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};

/// Trait for types that loops can operate on element by element
///
/// This trait connects Rust's type system to numr's runtime dtype system.
/// It's implemented for all primitive numeric types.
///
/// # Bounds
/// - `Pod + Zeroable` - Safe reinterpretation of raw operand bytes (bytemuck)
/// - `PartialOrd` - Comparison for min/max operations
///
/// # Arithmetic
/// Loops run behind a C ABI and must never panic, so arithmetic goes through
/// the `wrapping_*` methods rather than the std operators. Integers wrap on
/// overflow; a zero divisor or `MIN / -1` yields zero. Floats use IEEE
/// semantics.
pub trait Element: Copy + Send + Sync + Pod + Zeroable + 'static + PartialOrd {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    fn wrapping_add(self, rhs: Self) -> Self;

    fn wrapping_sub(self, rhs: Self) -> Self;

    fn wrapping_mul(self, rhs: Self) -> Self;

    /// Quotient, zero where integer division is undefined
    fn wrapping_div(self, rhs: Self) -> Self;

    fn wrapping_neg(self) -> Self;

    /// Absolute value; `MIN.wrapping_abs()` is `MIN` for signed integers
    fn wrapping_abs(self) -> Self;

    /// `self` raised to `exp`
    ///
    /// Integer powers are computed exactly with wrapping multiplication. A
    /// negative integer exponent truncates toward zero, so only bases 1 and
    /// -1 give a non-zero result.
    fn wrapping_pow(self, exp: Self) -> Self;
}

macro_rules! impl_float_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    self + rhs
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    self - rhs
                }

                #[inline]
                fn wrapping_mul(self, rhs: Self) -> Self {
                    self * rhs
                }

                #[inline]
                fn wrapping_div(self, rhs: Self) -> Self {
                    self / rhs
                }

                #[inline]
                fn wrapping_neg(self) -> Self {
                    -self
                }

                #[inline]
                fn wrapping_abs(self) -> Self {
                    self.abs()
                }

                #[inline]
                fn wrapping_pow(self, exp: Self) -> Self {
                    self.powf(exp)
                }
            }
        )*
    };
}

// Exponentiation by squaring over the full exponent range.
macro_rules! int_pow {
    ($base:expr, $exp:expr) => {{
        let (mut base, mut exp) = ($base, $exp);
        let mut acc = 1;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = <Self>::wrapping_mul(acc, base);
            }
            base = <Self>::wrapping_mul(base, base);
            exp >>= 1;
        }
        acc
    }};
}

macro_rules! impl_int_element {
    (@common $ty:ty => $dtype:ident) => {
        const DTYPE: DType = DType::$dtype;

        #[inline]
        fn to_f64(self) -> f64 {
            self as f64
        }

        #[inline]
        fn from_f64(v: f64) -> Self {
            v as $ty
        }

        #[inline]
        fn wrapping_add(self, rhs: Self) -> Self {
            <$ty>::wrapping_add(self, rhs)
        }

        #[inline]
        fn wrapping_sub(self, rhs: Self) -> Self {
            <$ty>::wrapping_sub(self, rhs)
        }

        #[inline]
        fn wrapping_mul(self, rhs: Self) -> Self {
            <$ty>::wrapping_mul(self, rhs)
        }

        #[inline]
        fn wrapping_div(self, rhs: Self) -> Self {
            self.checked_div(rhs).unwrap_or(0)
        }

        #[inline]
        fn wrapping_neg(self) -> Self {
            <$ty>::wrapping_neg(self)
        }
    };
    (signed: $($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                impl_int_element!(@common $ty => $dtype);

                #[inline]
                fn wrapping_abs(self) -> Self {
                    <$ty>::wrapping_abs(self)
                }

                #[inline]
                fn wrapping_pow(self, exp: Self) -> Self {
                    if exp < 0 {
                        return match self {
                            1 => 1,
                            -1 if exp & 1 == 0 => 1,
                            -1 => -1,
                            _ => 0,
                        };
                    }
                    int_pow!(self, exp)
                }
            }
        )*
    };
    (unsigned: $($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                impl_int_element!(@common $ty => $dtype);

                #[inline]
                fn wrapping_abs(self) -> Self {
                    self
                }

                #[inline]
                fn wrapping_pow(self, exp: Self) -> Self {
                    int_pow!(self, exp)
                }
            }
        )*
    };
}

impl_float_element! {
    f64 => F64,
    f32 => F32,
}

impl_int_element! {
    signed:
    i64 => I64,
    i32 => I32,
    i16 => I16,
    i8 => I8,
}

impl_int_element! {
    unsigned:
    u64 => U64,
    u32 => U32,
    u16 => U16,
    u8 => U8,
}

// bool is not Pod; boolean operands travel as u8.

#[cfg(feature = "f16")]
macro_rules! impl_half_element {
    ($($ty:ident => $dtype:ident),* $(,)?) => {
        $(
            impl Element for half::$ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    half::$ty::to_f64(self)
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    half::$ty::from_f64(v)
                }

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    self + rhs
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    self - rhs
                }

                #[inline]
                fn wrapping_mul(self, rhs: Self) -> Self {
                    self * rhs
                }

                #[inline]
                fn wrapping_div(self, rhs: Self) -> Self {
                    self / rhs
                }

                #[inline]
                fn wrapping_neg(self) -> Self {
                    -self
                }

                #[inline]
                fn wrapping_abs(self) -> Self {
                    Self::from_f64(self.to_f64().abs())
                }

                #[inline]
                fn wrapping_pow(self, exp: Self) -> Self {
                    Self::from_f64(self.to_f64().powf(exp.to_f64()))
                }
            }
        )*
    };
}

#[cfg(feature = "f16")]
impl_half_element! {
    f16 => F16,
    bf16 => BF16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtype() {
        assert_eq!(f64::DTYPE, DType::F64);
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(i32::DTYPE, DType::I32);
        assert_eq!(u8::DTYPE, DType::U8);
    }

    #[test]
    fn test_element_conversions() {
        assert_eq!(f32::from_f64(2.5).to_f64(), 2.5f32 as f64);
        assert_eq!(i32::from_f64(42.0), 42);
        assert_eq!(u8::from_f64(-1.0), 0);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        assert_eq!(Element::wrapping_add(i32::MAX, 1), i32::MIN);
        assert_eq!(Element::wrapping_sub(0u8, 1), 255);
        assert_eq!(Element::wrapping_mul(i64::MAX, 2), -2);
        assert_eq!(Element::wrapping_div(i32::MIN, -1), 0);
        assert_eq!(Element::wrapping_div(7u16, 0), 0);
        assert_eq!(Element::wrapping_div(-7i8, 2), -3);
        assert_eq!(Element::wrapping_neg(3u8), 253);
        assert_eq!(Element::wrapping_neg(9_007_199_254_740_993i64), -9_007_199_254_740_993);
        assert_eq!(Element::wrapping_abs(i8::MIN), i8::MIN);
        assert_eq!(Element::wrapping_abs(-5i16), 5);
    }

    #[test]
    fn test_integer_pow_is_exact() {
        assert_eq!(Element::wrapping_pow(3i64, 39), 4_052_555_153_018_976_267);
        assert_eq!(Element::wrapping_pow(2u8, 9), 0);
        assert_eq!(Element::wrapping_pow(7u32, 0), 1);
        assert_eq!(Element::wrapping_pow(2i32, -1), 0);
        assert_eq!(Element::wrapping_pow(-1i32, -3), -1);
        assert_eq!(Element::wrapping_pow(-1i32, -2), 1);
        assert_eq!(Element::wrapping_pow(1i8, i8::MIN), 1);
    }

    #[test]
    fn test_float_arithmetic_is_ieee() {
        assert_eq!(Element::wrapping_div(1.0f64, 0.0), f64::INFINITY);
        assert_eq!(Element::wrapping_pow(2.0f32, 3.0), 8.0);
        assert_eq!(Element::wrapping_neg(0.5f64), -0.5);
    }
}
