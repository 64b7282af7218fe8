//! External ufunc object model
//!
//! A ufunc is a dispatch table of type-specialized native loops. Each built-in
//! loop is a row of the flat `types` table (inputs then output, one byte per
//! argument) paired with a loop function and an opaque data pointer. Loops for
//! user-registered types hang off a separate registry as linked chains.
//!
//! ```text
//! Ufunc
//! ├── functions[ntypes]      loop function per built-in row
//! ├── data                   per-loop opaque data, or the arrays-as-data sentinel
//! ├── types[ntypes * nargs]  built-in type codes, external order
//! ├── userloops              user type -> Loop1d -> Loop1d -> ...
//! └── core_signature         present for generalized ufuncs
//! ```

pub mod loops;
pub mod matcher;
pub mod signature;
mod userloops;

pub use matcher::LoopMatch;
pub use signature::Signature;
pub use userloops::{Loop1d, LoopCapsule, UserLoops};

use crate::dtype::TypeNum;
use crate::error::{Error, Result};
use std::fmt;
use std::os::raw::{c_char, c_void};

/// Maximum number of arguments (inputs + outputs) a loop can take
pub const MAX_ARGS: usize = 32;

/// Native loop signature of the external library
///
/// `args` holds one pointer per argument (inputs first, output last),
/// `dimensions[0]` is the element count, `steps` holds one byte stride per
/// argument and `data` is the loop's opaque data.
pub type LoopFn = unsafe extern "C" fn(
    args: *mut *mut c_char,
    dimensions: *mut isize,
    steps: *mut isize,
    data: *mut c_void,
);

/// Opaque per-loop data pointer
///
/// The external library treats loop data as immutable once a ufunc is built,
/// so sharing it across threads is sound.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoopData(*mut c_void);

unsafe impl Send for LoopData {}
unsafe impl Sync for LoopData {}

impl LoopData {
    /// No data
    pub const NULL: Self = Self(std::ptr::null_mut());

    /// Wrap a raw pointer
    pub const fn new(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// Point at a value that lives for the rest of the program
    pub fn from_static<T: Sync>(value: &'static T) -> Self {
        Self(value as *const T as *mut c_void)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// Loop data table of a ufunc
#[derive(Clone, Debug)]
enum LoopDataTable {
    PerLoop(Vec<LoopData>),
    /// Sentinel: loops receive the operand arrays instead of opaque data
    ArraysAsData,
}

/// An external universal function
///
/// Immutable once built; shared by reference between host objects and every
/// kernel derived from it.
pub struct Ufunc {
    name: String,
    nin: usize,
    nout: usize,
    functions: Vec<LoopFn>,
    data: LoopDataTable,
    types: Vec<u8>,
    userloops: Option<UserLoops>,
    core_signature: Option<String>,
}

impl Ufunc {
    /// Start defining a ufunc with `nin` inputs and `nout` outputs
    pub fn builder(name: impl Into<String>, nin: usize, nout: usize) -> UfuncBuilder {
        UfuncBuilder {
            name: name.into(),
            nin,
            nout,
            loops: Vec::new(),
            arrays_as_data: false,
            core_signature: None,
            user_loops: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of inputs
    #[inline]
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Number of outputs
    #[inline]
    pub fn nout(&self) -> usize {
        self.nout
    }

    /// Number of arguments (inputs + outputs)
    #[inline]
    pub fn nargs(&self) -> usize {
        self.nin + self.nout
    }

    /// Number of built-in loops
    #[inline]
    pub fn ntypes(&self) -> usize {
        self.functions.len()
    }

    /// Whether this is a generalized ufunc operating over core dimensions
    #[inline]
    pub fn core_enabled(&self) -> bool {
        self.core_signature.is_some()
    }

    pub fn core_signature(&self) -> Option<&str> {
        self.core_signature.as_deref()
    }

    /// Whether the loops take operand arrays as their data
    #[inline]
    pub fn uses_arrays_as_data(&self) -> bool {
        matches!(self.data, LoopDataTable::ArraysAsData)
    }

    /// Type codes of built-in loop `index`, external order (inputs, output)
    pub fn loop_types(&self, index: usize) -> &[u8] {
        let nargs = self.nargs();
        &self.types[index * nargs..(index + 1) * nargs]
    }

    /// Loop function of built-in loop `index`
    pub fn loop_function(&self, index: usize) -> LoopFn {
        self.functions[index]
    }

    /// Opaque data of built-in loop `index`
    ///
    /// `None` when the ufunc uses arrays as data.
    pub fn loop_data(&self, index: usize) -> Option<LoopData> {
        match &self.data {
            LoopDataTable::PerLoop(data) => Some(data[index]),
            LoopDataTable::ArraysAsData => None,
        }
    }

    /// Registry of loops for user-defined types
    pub fn user_loops(&self) -> Option<&UserLoops> {
        self.userloops.as_ref()
    }
}

impl fmt::Debug for Ufunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ufunc")
            .field("name", &self.name)
            .field("nin", &self.nin)
            .field("nout", &self.nout)
            .field("ntypes", &self.ntypes())
            .field("core_signature", &self.core_signature)
            .finish_non_exhaustive()
    }
}

struct PendingUserLoop {
    usertype: TypeNum,
    func: LoopFn,
    arg_types: Vec<TypeNum>,
    data: LoopData,
}

/// Builder for [`Ufunc`]
///
/// Definitions are validated in [`UfuncBuilder::build`].
pub struct UfuncBuilder {
    name: String,
    nin: usize,
    nout: usize,
    loops: Vec<(Vec<TypeNum>, LoopFn, LoopData)>,
    arrays_as_data: bool,
    core_signature: Option<String>,
    user_loops: Vec<PendingUserLoop>,
}

impl UfuncBuilder {
    /// Add a built-in loop; `types` is in external order (inputs, output)
    pub fn add_loop(mut self, types: &[TypeNum], func: LoopFn, data: LoopData) -> Self {
        self.loops.push((types.to_vec(), func, data));
        self
    }

    /// Mark the loops as taking operand arrays as their data
    pub fn uses_arrays_as_data(mut self) -> Self {
        self.arrays_as_data = true;
        self
    }

    /// Make this a generalized ufunc with the given core signature
    pub fn core_signature(mut self, signature: impl Into<String>) -> Self {
        self.core_signature = Some(signature.into());
        self
    }

    /// Register a loop for a user-defined type
    ///
    /// Loops registered for the same type form a chain in registration order.
    /// Registering identical argument types again replaces that loop.
    pub fn register_loop_for_type(
        mut self,
        usertype: TypeNum,
        func: LoopFn,
        arg_types: &[TypeNum],
        data: LoopData,
    ) -> Self {
        self.user_loops.push(PendingUserLoop {
            usertype,
            func,
            arg_types: arg_types.to_vec(),
            data,
        });
        self
    }

    pub fn build(self) -> Result<Ufunc> {
        let nargs = self.nin + self.nout;
        if nargs == 0 || nargs > MAX_ARGS {
            return Err(Error::invalid_ufunc(
                &self.name,
                format!("argument count {nargs} outside 1..={MAX_ARGS}"),
            ));
        }

        let mut functions = Vec::with_capacity(self.loops.len());
        let mut data = Vec::with_capacity(self.loops.len());
        let mut types = Vec::with_capacity(self.loops.len() * nargs);
        for (loop_types, func, loop_data) in self.loops {
            if loop_types.len() != nargs {
                return Err(Error::invalid_ufunc(
                    &self.name,
                    format!("loop has {} types, expected {nargs}", loop_types.len()),
                ));
            }
            for num in loop_types {
                let code = num.as_type_code().ok_or_else(|| {
                    Error::invalid_ufunc(
                        &self.name,
                        format!("type {num} cannot appear in the built-in loop table"),
                    )
                })?;
                types.push(code);
            }
            functions.push(func);
            data.push(loop_data);
        }

        let mut userloops: Option<UserLoops> = None;
        for pending in self.user_loops {
            if !pending.usertype.is_user_defined() {
                return Err(Error::invalid_ufunc(
                    &self.name,
                    format!(
                        "loops can only be registered for user types, got {}",
                        pending.usertype
                    ),
                ));
            }
            if pending.arg_types.len() != nargs {
                return Err(Error::invalid_ufunc(
                    &self.name,
                    format!(
                        "user loop has {} types, expected {nargs}",
                        pending.arg_types.len()
                    ),
                ));
            }
            userloops.get_or_insert_with(UserLoops::default).register(
                pending.usertype,
                pending.func,
                pending.arg_types,
                pending.data,
            );
        }

        Ok(Ufunc {
            name: self.name,
            nin: self.nin,
            nout: self.nout,
            functions,
            data: if self.arrays_as_data {
                LoopDataTable::ArraysAsData
            } else {
                LoopDataTable::PerLoop(data)
            },
            types,
            userloops,
            core_signature: self.core_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn noop(_: *mut *mut c_char, _: *mut isize, _: *mut isize, _: *mut c_void) {}

    #[test]
    fn test_builder_flattens_type_table() {
        let ufunc = Ufunc::builder("f", 2, 1)
            .add_loop(&[TypeNum::INT; 3], noop, LoopData::NULL)
            .add_loop(
                &[TypeNum::FLOAT, TypeNum::FLOAT, TypeNum::DOUBLE],
                noop,
                LoopData::NULL,
            )
            .build()
            .unwrap();
        assert_eq!(ufunc.ntypes(), 2);
        assert_eq!(ufunc.nargs(), 3);
        assert_eq!(ufunc.loop_types(0), &[5, 5, 5]);
        assert_eq!(ufunc.loop_types(1), &[11, 11, 12]);
        assert_eq!(ufunc.loop_data(1), Some(LoopData::NULL));
        assert!(!ufunc.core_enabled());
        assert!(ufunc.user_loops().is_none());
    }

    #[test]
    fn test_builder_rejects_malformed_loops() {
        let wrong_len = Ufunc::builder("f", 1, 1)
            .add_loop(&[TypeNum::INT; 3], noop, LoopData::NULL)
            .build();
        assert!(matches!(wrong_len, Err(Error::InvalidUfunc { .. })));

        let user_in_table = Ufunc::builder("f", 1, 1)
            .add_loop(&[TypeNum::USERDEF, TypeNum::INT], noop, LoopData::NULL)
            .build();
        assert!(matches!(user_in_table, Err(Error::InvalidUfunc { .. })));

        let builtin_user_loop = Ufunc::builder("f", 1, 1)
            .register_loop_for_type(TypeNum::INT, noop, &[TypeNum::INT; 2], LoopData::NULL)
            .build();
        assert!(matches!(builtin_user_loop, Err(Error::InvalidUfunc { .. })));

        let too_many = Ufunc::builder("f", MAX_ARGS, 1).build();
        assert!(matches!(too_many, Err(Error::InvalidUfunc { .. })));
    }

    #[test]
    fn test_arrays_as_data_sentinel() {
        let ufunc = Ufunc::builder("f", 1, 1)
            .add_loop(&[TypeNum::DOUBLE; 2], noop, LoopData::NULL)
            .uses_arrays_as_data()
            .build()
            .unwrap();
        assert!(ufunc.uses_arrays_as_data());
        assert_eq!(ufunc.loop_data(0), None);
    }
}
