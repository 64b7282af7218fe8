//! External element type numbering and descriptors
//!
//! The ufunc library identifies element types by small integers. Built-in
//! types occupy `0..=23`; types registered at runtime start at
//! [`TypeNum::USERDEF`]. A [`Descr`] carries the metadata the library
//! attaches to a type number (kind, type character, item size, name).

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// External library type number
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeNum(pub i32);

impl TypeNum {
    pub const BOOL: Self = Self(0);
    pub const BYTE: Self = Self(1);
    pub const UBYTE: Self = Self(2);
    pub const SHORT: Self = Self(3);
    pub const USHORT: Self = Self(4);
    pub const INT: Self = Self(5);
    pub const UINT: Self = Self(6);
    pub const LONG: Self = Self(7);
    pub const ULONG: Self = Self(8);
    pub const LONGLONG: Self = Self(9);
    pub const ULONGLONG: Self = Self(10);
    pub const FLOAT: Self = Self(11);
    pub const DOUBLE: Self = Self(12);
    pub const LONGDOUBLE: Self = Self(13);
    pub const CFLOAT: Self = Self(14);
    pub const CDOUBLE: Self = Self(15);
    pub const CLONGDOUBLE: Self = Self(16);
    pub const OBJECT: Self = Self(17);
    pub const STRING: Self = Self(18);
    pub const UNICODE: Self = Self(19);
    pub const VOID: Self = Self(20);
    pub const DATETIME: Self = Self(21);
    pub const TIMEDELTA: Self = Self(22);
    pub const HALF: Self = Self(23);
    /// First type number handed out to user-registered types
    pub const USERDEF: Self = Self(256);

    /// Whether this number belongs to a user-registered type
    #[inline]
    pub const fn is_user_defined(self) -> bool {
        self.0 >= Self::USERDEF.0
    }

    /// Type code as stored in a ufunc's built-in type table, if it fits
    #[inline]
    pub fn as_type_code(self) -> Option<u8> {
        u8::try_from(self.0).ok()
    }
}

impl From<u8> for TypeNum {
    fn from(code: u8) -> Self {
        Self(i32::from(code))
    }
}

impl fmt::Display for TypeNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type descriptor of the external library
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Descr {
    type_num: TypeNum,
    kind: char,
    type_char: char,
    itemsize: usize,
    name: Cow<'static, str>,
}

const fn builtin(
    num: TypeNum,
    kind: char,
    type_char: char,
    itemsize: usize,
    name: &'static str,
) -> Descr {
    Descr {
        type_num: num,
        kind,
        type_char,
        itemsize,
        name: Cow::Borrowed(name),
    }
}

const LONG_SIZE: usize = std::mem::size_of::<std::os::raw::c_long>();
const LONG_NAME: &str = if LONG_SIZE == 8 { "int64" } else { "int32" };
const ULONG_NAME: &str = if LONG_SIZE == 8 { "uint64" } else { "uint32" };

/// Built-in descriptors, indexed by type number
static BUILTIN_DESCRS: [Descr; 24] = [
    builtin(TypeNum::BOOL, 'b', '?', 1, "bool"),
    builtin(TypeNum::BYTE, 'i', 'b', 1, "int8"),
    builtin(TypeNum::UBYTE, 'u', 'B', 1, "uint8"),
    builtin(TypeNum::SHORT, 'i', 'h', 2, "int16"),
    builtin(TypeNum::USHORT, 'u', 'H', 2, "uint16"),
    builtin(TypeNum::INT, 'i', 'i', 4, "int32"),
    builtin(TypeNum::UINT, 'u', 'I', 4, "uint32"),
    builtin(TypeNum::LONG, 'i', 'l', LONG_SIZE, LONG_NAME),
    builtin(TypeNum::ULONG, 'u', 'L', LONG_SIZE, ULONG_NAME),
    builtin(TypeNum::LONGLONG, 'i', 'q', 8, "int64"),
    builtin(TypeNum::ULONGLONG, 'u', 'Q', 8, "uint64"),
    builtin(TypeNum::FLOAT, 'f', 'f', 4, "float32"),
    builtin(TypeNum::DOUBLE, 'f', 'd', 8, "float64"),
    builtin(TypeNum::LONGDOUBLE, 'f', 'g', 16, "float128"),
    builtin(TypeNum::CFLOAT, 'c', 'F', 8, "complex64"),
    builtin(TypeNum::CDOUBLE, 'c', 'D', 16, "complex128"),
    builtin(TypeNum::CLONGDOUBLE, 'c', 'G', 32, "complex256"),
    builtin(TypeNum::OBJECT, 'O', 'O', 8, "object"),
    builtin(TypeNum::STRING, 'S', 'S', 0, "bytes"),
    builtin(TypeNum::UNICODE, 'U', 'U', 0, "str"),
    builtin(TypeNum::VOID, 'V', 'V', 0, "void"),
    builtin(TypeNum::DATETIME, 'M', 'M', 8, "datetime64"),
    builtin(TypeNum::TIMEDELTA, 'm', 'm', 8, "timedelta64"),
    builtin(TypeNum::HALF, 'f', 'e', 2, "float16"),
];

static USER_TYPES: OnceLock<RwLock<Vec<Descr>>> = OnceLock::new();

fn user_types() -> &'static RwLock<Vec<Descr>> {
    USER_TYPES.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register a user-defined element type with the external library
///
/// Registration is idempotent by name: registering a name twice returns the
/// descriptor handed out the first time.
pub fn register_user_type(name: &str, itemsize: usize) -> Descr {
    let mut registry = user_types().write();
    if let Some(existing) = registry.iter().find(|d| d.name == name) {
        return existing.clone();
    }
    let type_num = TypeNum(TypeNum::USERDEF.0 + registry.len() as i32);
    let descr = Descr {
        type_num,
        kind: 'V',
        type_char: 'V',
        itemsize,
        name: Cow::Owned(name.to_owned()),
    };
    tracing::debug!(name, type_num = type_num.0, "registered user type");
    registry.push(descr.clone());
    descr
}

impl Descr {
    /// Look up the descriptor for a type number
    pub fn from_type_num(type_num: TypeNum) -> Result<Self> {
        if let Ok(index) = usize::try_from(type_num.0) {
            if let Some(descr) = BUILTIN_DESCRS.get(index) {
                return Ok(descr.clone());
            }
        }
        if type_num.is_user_defined() {
            let index = (type_num.0 - TypeNum::USERDEF.0) as usize;
            if let Some(descr) = user_types().read().get(index) {
                return Ok(descr.clone());
            }
        }
        Err(Error::UnsupportedTypeNum {
            type_num,
            target: "descriptor",
        })
    }

    /// Type number
    #[inline]
    pub fn type_num(&self) -> TypeNum {
        self.type_num
    }

    /// Kind character ('b', 'i', 'u', 'f', 'c', ...)
    #[inline]
    pub fn kind(&self) -> char {
        self.kind
    }

    /// Single-character type code
    #[inline]
    pub fn type_char(&self) -> char {
        self.type_char
    }

    /// Size of one element in bytes (0 for flexible types)
    #[inline]
    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    /// Canonical name ("int32", "float64", ...)
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host representation, e.g. `dtype('int32')`
    pub fn repr(&self) -> String {
        format!("dtype('{}')", self.name)
    }
}

impl fmt::Display for Descr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn not_understood(s: &str) -> Error {
    Error::unconvertible(format!("data type '{s}' not understood"))
}

impl FromStr for Descr {
    type Err = Error;

    /// Parse a type name, a type character, or a kind+size code such as
    /// `"<i4"`.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(descr) = BUILTIN_DESCRS.iter().find(|d| d.name == s) {
            return Ok(descr.clone());
        }
        if let Some(descr) = user_types().read().iter().find(|d| d.name == s) {
            return Ok(descr.clone());
        }

        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return BUILTIN_DESCRS
                .iter()
                .find(|d| d.type_char == c)
                .cloned()
                .ok_or_else(|| not_understood(s));
        }

        let code = s.trim_start_matches(['<', '>', '=', '|']);
        let mut chars = code.chars();
        let kind = chars.next().ok_or_else(|| not_understood(s))?;
        let size: usize = chars.as_str().parse().map_err(|_| not_understood(s))?;
        BUILTIN_DESCRS
            .iter()
            .find(|d| d.kind == kind && d.itemsize == size)
            .cloned()
            .ok_or_else(|| not_understood(s))
    }
}
