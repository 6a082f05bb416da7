//! Describing data
//!
//! A direct relationship between a Rust type and a predefined MPI datatype is covered by the
//! [`Equivalence`] trait. Alongside the datatype it records how the type is classified (integer,
//! floating point, logical). The classification decides which reduction operators accept the
//! type: the table below implements [`Operand`](crate::op::Operand) only for the operator kinds
//! that are legal for each type, so an illegal pairing does not compile.
//!
//! [`DynBuffer`] and [`DynBufferMut`] carry a datatype next to the data when the element type is
//! only known at run time.

use std::marker::PhantomData;
use std::os::raw::c_void;
use std::slice;

use crate::error::{count_of, Result};
use crate::ffi;
use crate::ffi::MPI_Datatype;
use crate::op::{Accumulate, Bitwise, Comparison, Logical, Operand};
use crate::raw::traits::*;
use crate::Count;

/// Datatype traits
pub mod traits {
    pub use super::Equivalence;
}

/// A reference to an MPI data type.
///
/// This is similar to a raw `MPI_Datatype` but is guaranteed to be a valid for `'a`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DatatypeRef<'a> {
    datatype: MPI_Datatype,
    phantom: PhantomData<&'a ()>,
}

unsafe impl<'a> AsRaw for DatatypeRef<'a> {
    type Raw = MPI_Datatype;
    fn as_raw(&self) -> Self::Raw {
        self.datatype
    }
}

impl<'a> DatatypeRef<'a> {
    /// Wrap a raw datatype handle.
    ///
    /// # Safety
    ///
    /// `datatype` must stay a committed datatype for `'a`.
    pub unsafe fn from_raw(datatype: MPI_Datatype) -> Self {
        DatatypeRef {
            datatype,
            phantom: PhantomData,
        }
    }
}

/// A value type with a predefined MPI datatype of identical layout.
///
/// # Safety
///
/// The datatype returned by `equivalent_datatype` must describe exactly the memory layout of
/// `Self`.
pub unsafe trait Equivalence: Copy {
    /// Whether the type is an integer type
    const IS_INTEGER: bool = false;
    /// Whether the type is a floating point type
    const IS_FLOATING_POINT: bool = false;
    /// Whether the type is a logical (boolean) type
    const IS_LOGICAL: bool = false;

    /// The MPI datatype describing `Self`
    fn equivalent_datatype() -> DatatypeRef<'static>;
}

// The classification selects both the flag and the operator kinds.
macro_rules! equivalent_system_datatype {
    (@impl $rstype:ty, $mpitype:ident, $flag:ident, [$($kind:ident),*]) => {
        unsafe impl Equivalence for $rstype {
            const $flag: bool = true;
            fn equivalent_datatype() -> DatatypeRef<'static> {
                unsafe { DatatypeRef::from_raw(ffi::$mpitype) }
            }
        }
        $(unsafe impl Operand<$kind> for $rstype {})*
    };
    ($rstype:ty, $mpitype:ident, integer) => {
        equivalent_system_datatype!(
            @impl $rstype, $mpitype, IS_INTEGER, [Comparison, Accumulate, Logical, Bitwise]
        );
    };
    ($rstype:ty, $mpitype:ident, floating_point) => {
        equivalent_system_datatype!(
            @impl $rstype, $mpitype, IS_FLOATING_POINT, [Comparison, Accumulate]
        );
    };
    ($rstype:ty, $mpitype:ident, logical) => {
        equivalent_system_datatype!(@impl $rstype, $mpitype, IS_LOGICAL, [Logical]);
    };
}

equivalent_system_datatype!(bool, RSMPI_C_BOOL, logical);

equivalent_system_datatype!(f32, RSMPI_FLOAT, floating_point);
equivalent_system_datatype!(f64, RSMPI_DOUBLE, floating_point);

equivalent_system_datatype!(i8, RSMPI_INT8_T, integer);
equivalent_system_datatype!(i16, RSMPI_INT16_T, integer);
equivalent_system_datatype!(i32, RSMPI_INT32_T, integer);
equivalent_system_datatype!(i64, RSMPI_INT64_T, integer);

equivalent_system_datatype!(u8, RSMPI_UINT8_T, integer);
equivalent_system_datatype!(u16, RSMPI_UINT16_T, integer);
equivalent_system_datatype!(u32, RSMPI_UINT32_T, integer);
equivalent_system_datatype!(u64, RSMPI_UINT64_T, integer);

#[cfg(target_pointer_width = "32")]
equivalent_system_datatype!(usize, RSMPI_UINT32_T, integer);
#[cfg(target_pointer_width = "32")]
equivalent_system_datatype!(isize, RSMPI_INT32_T, integer);

#[cfg(target_pointer_width = "64")]
equivalent_system_datatype!(usize, RSMPI_UINT64_T, integer);
#[cfg(target_pointer_width = "64")]
equivalent_system_datatype!(isize, RSMPI_INT64_T, integer);

/// An immutable dynamically-typed buffer.
///
/// The buffer has a definite length and MPI datatype, but it is not yet known which Rust type it
/// corresponds to.  This is the MPI analogue of `&Any`.
#[derive(Copy, Clone, Debug)]
pub struct DynBuffer<'a> {
    ptr: *const c_void,
    len: usize,
    datatype: DatatypeRef<'a>,
}

impl<'a> DynBuffer<'a> {
    /// Creates a buffer from a slice with whose type has an MPI equivalent.
    pub fn new<T: Equivalence>(buf: &'a [T]) -> Self {
        DynBuffer {
            ptr: buf.as_ptr() as *const c_void,
            len: buf.len(),
            datatype: T::equivalent_datatype(),
        }
    }

    /// Creates a buffer from its raw components.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` initialized elements of `datatype` that remain valid for `'a`.
    pub unsafe fn from_raw<T>(ptr: *const T, len: usize, datatype: DatatypeRef<'a>) -> Self {
        debug_assert!(!ptr.is_null());
        DynBuffer {
            ptr: ptr as *const c_void,
            len,
            datatype,
        }
    }

    /// Tests whether the buffer type matches `T`.
    pub fn is<T: Equivalence>(&self) -> bool {
        self.datatype.as_raw() == T::equivalent_datatype().as_raw()
    }

    /// Returns some slice if the type matches `T`, or `None` if it doesn't.
    pub fn downcast<T: Equivalence>(self) -> Option<&'a [T]> {
        if self.is::<T>() {
            unsafe { Some(slice::from_raw_parts(self.ptr as *const T, self.len)) }
        } else {
            None
        }
    }

    /// Returns the number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the underlying raw pointer.
    pub fn as_ptr(&self) -> *const c_void {
        self.ptr
    }

    /// The datatype of the elements.
    pub fn datatype(&self) -> DatatypeRef<'a> {
        self.datatype
    }

    pub(crate) fn count(&self, what: &'static str) -> Result<Count> {
        count_of(what, self.len)
    }
}

/// A mutable dynamically-typed buffer.
///
/// This is the MPI analogue of `&mut Any`.
#[derive(Debug)]
pub struct DynBufferMut<'a> {
    ptr: *mut c_void,
    len: usize,
    datatype: DatatypeRef<'a>,
}

impl<'a> DynBufferMut<'a> {
    /// Creates a mutable buffer from a mutable slice with whose type has an MPI equivalent.
    pub fn new<T: Equivalence>(buf: &'a mut [T]) -> Self {
        DynBufferMut {
            ptr: buf.as_mut_ptr() as *mut c_void,
            len: buf.len(),
            datatype: T::equivalent_datatype(),
        }
    }

    /// Creates a buffer from its raw components.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` elements of `datatype` that remain valid and unaliased for `'a`.
    pub unsafe fn from_raw<T>(ptr: *mut T, len: usize, datatype: DatatypeRef<'a>) -> Self {
        debug_assert!(!ptr.is_null());
        DynBufferMut {
            ptr: ptr as *mut c_void,
            len,
            datatype,
        }
    }

    /// Tests whether the buffer type matches `T`.
    pub fn is<T: Equivalence>(&self) -> bool {
        self.datatype.as_raw() == T::equivalent_datatype().as_raw()
    }

    /// Returns some mutable slice if the type matches `T`, or `None` if it doesn't.
    pub fn downcast<T: Equivalence>(self) -> Option<&'a mut [T]> {
        if self.is::<T>() {
            unsafe { Some(slice::from_raw_parts_mut(self.ptr as *mut T, self.len)) }
        } else {
            None
        }
    }

    /// Reborrows the buffer with a shorter lifetime.
    pub fn reborrow_mut(&mut self) -> DynBufferMut {
        DynBufferMut {
            ptr: self.ptr,
            len: self.len,
            datatype: self.datatype,
        }
    }

    /// Returns the number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the underlying raw pointer.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.ptr
    }

    /// The datatype of the elements.
    pub fn datatype(&self) -> DatatypeRef<'a> {
        self.datatype
    }
}
