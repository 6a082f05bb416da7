//! Reduction operators
//!
//! The predefined operators are grouped by kind. A value type can be combined with an operator of
//! kind `K` only if it implements [`Operand<K>`]:
//!
//! | kind | operators | accepted types |
//! |------|-----------|----------------|
//! | [`Comparison`] | `max`, `min` | integers, floating point |
//! | [`Accumulate`] | `sum`, `product` | integers, floating point |
//! | [`Logical`] | `logical_and`, `logical_or`, `logical_xor` | integers, `bool` |
//! | [`Bitwise`] | `bitwise_and`, `bitwise_or`, `bitwise_xor` | integers |

use std::fmt;
use std::marker::PhantomData;

use crate::datatype::Equivalence;
use crate::error::{check_result, Result};
use crate::ffi;
use crate::ffi::MPI_Op;
use crate::handle::{Handle, HandleTraits};
use crate::raw::traits::*;

/// Operator traits
pub mod traits {
    pub use super::Operand;
}

/// Handle traits of `MPI_Op`. All predefined operators are system handles.
#[derive(Debug)]
pub enum OpHandle {}

impl HandleTraits for OpHandle {
    type Raw = MPI_Op;

    fn null() -> MPI_Op {
        unsafe { ffi::RSMPI_OP_NULL }
    }

    fn destroy(raw: &mut MPI_Op) -> Result<()> {
        check_result(unsafe { ffi::MPI_Op_free(raw) })
    }

    fn is_system_handle(raw: MPI_Op) -> bool {
        let system = unsafe {
            [
                ffi::RSMPI_MAX,
                ffi::RSMPI_MIN,
                ffi::RSMPI_SUM,
                ffi::RSMPI_PROD,
                ffi::RSMPI_LAND,
                ffi::RSMPI_BAND,
                ffi::RSMPI_LOR,
                ffi::RSMPI_BOR,
                ffi::RSMPI_LXOR,
                ffi::RSMPI_BXOR,
            ]
        };
        system.contains(&raw)
    }
}

/// Kind of `max` and `min`
#[derive(Debug)]
pub enum Comparison {}
/// Kind of `sum` and `product`
#[derive(Debug)]
pub enum Accumulate {}
/// Kind of the logical operators
#[derive(Debug)]
pub enum Logical {}
/// Kind of the bitwise operators
#[derive(Debug)]
pub enum Bitwise {}

/// A value type that operators of kind `K` can combine.
///
/// # Safety
///
/// The MPI library must define the operators of kind `K` on the equivalent datatype of `Self`.
pub unsafe trait Operand<K>: Equivalence {}

/// A reference to a predefined reduction operator of kind `K`.
pub struct Op<K> {
    handle: Handle<OpHandle>,
    kind: PhantomData<fn() -> K>,
}

impl<K> Op<K> {
    fn system(raw: MPI_Op) -> Self {
        Op {
            handle: unsafe { Handle::from_raw(raw) },
            kind: PhantomData,
        }
    }

    /// The underlying handle.
    pub fn handle(&self) -> Handle<OpHandle> {
        self.handle
    }
}

impl<K> Clone for Op<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Op<K> {}

impl<K> fmt::Debug for Op<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Op").field(&self.handle).finish()
    }
}

unsafe impl<K> AsRaw for Op<K> {
    type Raw = MPI_Op;
    fn as_raw(&self) -> Self::Raw {
        self.handle.as_raw()
    }
}

macro_rules! system_operations {
    ($($(#[$attr:meta])* $name:ident: $kind:ident = $raw:ident;)*) => {
        $(
            impl Op<$kind> {
                $(#[$attr])*
                pub fn $name() -> Self {
                    Op::system(unsafe { ffi::$raw })
                }
            }
        )*
    };
}

system_operations! {
    /// Maximum, `MPI_MAX`
    max: Comparison = RSMPI_MAX;
    /// Minimum, `MPI_MIN`
    min: Comparison = RSMPI_MIN;
    /// Sum, `MPI_SUM`
    sum: Accumulate = RSMPI_SUM;
    /// Product, `MPI_PROD`
    product: Accumulate = RSMPI_PROD;
    /// Logical and, `MPI_LAND`
    logical_and: Logical = RSMPI_LAND;
    /// Logical or, `MPI_LOR`
    logical_or: Logical = RSMPI_LOR;
    /// Logical exclusive or, `MPI_LXOR`
    logical_xor: Logical = RSMPI_LXOR;
    /// Bitwise and, `MPI_BAND`
    bitwise_and: Bitwise = RSMPI_BAND;
    /// Bitwise or, `MPI_BOR`
    bitwise_or: Bitwise = RSMPI_BOR;
    /// Bitwise exclusive or, `MPI_BXOR`
    bitwise_xor: Bitwise = RSMPI_BXOR;
}
