//! The `Value` register cell.
//!
//! A bare word reinterpretable as an unsigned 64-bit integer, a 64-bit float,
//! a bool, or a pointer to a heap object. Values are untyped at runtime: the
//! resolver (§4.4) has already proven every register holds the type the
//! bytecode expects it to, so the VM never needs a tag to interpret one.

use crate::heap::ObjectHeader;

#[repr(C)]
pub union Value {
    pub as_uint: u64,
    pub as_int: i64,
    pub as_float: f64,
    pub as_bool: bool,
    pub as_object: *mut ObjectHeader,
}

impl Clone for Value {
    fn clone(&self) -> Self {
        *self
    }
}
impl Copy for Value {}

impl Value {
    pub const ZERO: Value = Value { as_uint: 0 };

    pub const fn from_uint(value: u64) -> Self {
        Value { as_uint: value }
    }

    pub const fn from_float(value: f64) -> Self {
        Value { as_float: value }
    }

    pub const fn from_bool(value: bool) -> Self {
        Value { as_bool: value }
    }

    pub const fn from_object(ptr: *mut ObjectHeader) -> Self {
        Value { as_object: ptr }
    }

    /// # Safety
    /// The caller must know this cell currently holds the integer variant.
    pub unsafe fn as_uint(self) -> u64 {
        unsafe { self.as_uint }
    }

    /// # Safety
    /// The caller must know this cell currently holds the float variant.
    pub unsafe fn as_float(self) -> f64 {
        unsafe { self.as_float }
    }

    /// # Safety
    /// The caller must know this cell currently holds the bool variant.
    pub unsafe fn as_bool(self) -> bool {
        unsafe { self.as_bool }
    }

    /// # Safety
    /// The caller must know this cell currently holds an object pointer.
    pub unsafe fn as_object(self) -> *mut ObjectHeader {
        unsafe { self.as_object }
    }
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // SAFETY: just reading the raw bits, not interpreting a typed variant.
        write!(f, "Value({:#018x})", unsafe { self.as_uint })
    }
}
