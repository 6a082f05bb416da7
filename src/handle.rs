//! Ownership-tagged handles
//!
//! Every MPI resource kind (communicator, group, request, window, keyval, operation) is described
//! by a [`HandleTraits`] implementation: its raw type, its null value, how to destroy it and which
//! values are predefined by the library and must never be destroyed.
//!
//! On top of that description there are two wrappers:
//!
//! - [`Handle`] is a plain reference. It is `Copy` and never destroys anything.
//! - [`UniqueHandle`] is the sole owner. It cannot be cloned, and it destroys the resource when
//!   dropped unless ownership has been given up with [`UniqueHandle::into_raw`].
//!
//! The [`Deref`] capability lets owners hand out references without giving up ownership, so that
//! functions can be written once against "anything that derefs to a `Comm`".

use std::fmt;
use std::marker::PhantomData;
use std::mem;

use log::{debug, error};

use crate::error::Result;
use crate::raw::traits::*;

/// Handle traits
pub mod traits {
    pub use super::{Deref, HandleTraits};
}

/// Describes one kind of MPI resource.
pub trait HandleTraits {
    /// The raw handle type of the C API
    type Raw: Copy + PartialEq + fmt::Debug;

    /// The null value of this kind, e.g. `MPI_COMM_NULL`
    fn null() -> Self::Raw;

    /// Release the resource. On success the library resets `raw` to null.
    ///
    /// Never called with the null value or with a system handle.
    fn destroy(raw: &mut Self::Raw) -> Result<()>;

    /// Whether `raw` is predefined by the library and must not be destroyed.
    fn is_system_handle(_raw: Self::Raw) -> bool {
        false
    }
}

/// Produce a non-owning reference of type `To` aliasing the same resource.
///
/// Implemented by every reference type for itself and by every owner for its reference type. The
/// owner must outlive the references derived from it.
pub trait Deref<To> {
    /// A fresh reference to the underlying resource
    fn deref(&self) -> To;
}

impl<'a, To, T: Deref<To> + ?Sized> Deref<To> for &'a T {
    fn deref(&self) -> To {
        (**self).deref()
    }
}

impl<'a, To, T: Deref<To> + ?Sized> Deref<To> for &'a mut T {
    fn deref(&self) -> To {
        (**self).deref()
    }
}

/// A non-owning reference to an MPI resource.
#[repr(transparent)]
pub struct Handle<H: HandleTraits> {
    raw: H::Raw,
    phantom: PhantomData<fn() -> H>,
}

impl<H: HandleTraits> Handle<H> {
    /// Wrap a raw handle without taking ownership.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a valid handle of this kind for as long as the reference is used.
    pub unsafe fn from_raw(raw: H::Raw) -> Self {
        Handle {
            raw,
            phantom: PhantomData,
        }
    }

    /// The null reference of this kind.
    pub fn null() -> Self {
        Handle {
            raw: H::null(),
            phantom: PhantomData,
        }
    }

    /// Whether this refers to nothing.
    pub fn is_null(&self) -> bool {
        self.raw == H::null()
    }

    /// Whether this refers to a library-predefined resource.
    pub fn is_system_handle(&self) -> bool {
        H::is_system_handle(self.raw)
    }
}

impl<H: HandleTraits> Clone for Handle<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H: HandleTraits> Copy for Handle<H> {}

impl<H: HandleTraits> PartialEq for Handle<H> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<H: HandleTraits> fmt::Debug for Handle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.raw).finish()
    }
}

unsafe impl<H: HandleTraits> AsRaw for Handle<H> {
    type Raw = H::Raw;
    fn as_raw(&self) -> Self::Raw {
        self.raw
    }
}

impl<H: HandleTraits> Deref<Handle<H>> for Handle<H> {
    fn deref(&self) -> Handle<H> {
        *self
    }
}

/// The sole owner of an MPI resource.
///
/// Dropping a non-null owner destroys the resource. System handles are never destroyed; adopting
/// one through [`UniqueHandle::from_raw`] is a programming error caught in debug builds.
#[repr(transparent)]
pub struct UniqueHandle<H: HandleTraits> {
    raw: H::Raw,
    phantom: PhantomData<fn() -> H>,
}

impl<H: HandleTraits> UniqueHandle<H> {
    /// Take ownership of a raw handle.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a valid handle that nothing else will destroy.
    pub unsafe fn from_raw(raw: H::Raw) -> Self {
        debug_assert!(
            !H::is_system_handle(raw),
            "system handles cannot be owned"
        );
        Self::adopt(raw)
    }

    /// Take ownership of a handle the library just produced. Such a handle may legitimately be a
    /// system handle (e.g. `MPI_GROUP_EMPTY`), which teardown will then leave alone.
    pub(crate) fn adopt(raw: H::Raw) -> Self {
        if raw != H::null() {
            debug!("owning {:?}", raw);
        }
        UniqueHandle {
            raw,
            phantom: PhantomData,
        }
    }

    /// An owner holding nothing.
    pub fn null() -> Self {
        Self::adopt(H::null())
    }

    /// Whether this owns nothing.
    pub fn is_null(&self) -> bool {
        self.raw == H::null()
    }

    /// Give up ownership and return the raw handle without destroying it.
    pub fn into_raw(mut self) -> H::Raw {
        mem::replace(&mut self.raw, H::null())
    }

    /// Destroy the owned resource now and leave the owner null.
    pub fn reset(&mut self) -> Result<()> {
        if self.is_null() {
            return Ok(());
        }
        if H::is_system_handle(self.raw) {
            self.raw = H::null();
            return Ok(());
        }
        debug!("destroying {:?}", self.raw);
        let mut raw = mem::replace(&mut self.raw, H::null());
        H::destroy(&mut raw)
    }

    /// A reference to the owned resource.
    pub fn handle(&self) -> Handle<H> {
        Handle {
            raw: self.raw,
            phantom: PhantomData,
        }
    }
}

impl<H: HandleTraits> Drop for UniqueHandle<H> {
    fn drop(&mut self) {
        if let Err(err) = self.reset() {
            error!("failed to destroy an MPI handle: {}", err);
        }
    }
}

impl<H: HandleTraits> fmt::Debug for UniqueHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniqueHandle").field(&self.raw).finish()
    }
}

impl<H: HandleTraits> Default for UniqueHandle<H> {
    fn default() -> Self {
        Self::null()
    }
}

unsafe impl<H: HandleTraits> AsRaw for UniqueHandle<H> {
    type Raw = H::Raw;
    fn as_raw(&self) -> Self::Raw {
        self.raw
    }
}

unsafe impl<H: HandleTraits> AsRawMut for UniqueHandle<H> {
    fn as_raw_mut(&mut self) -> *mut H::Raw {
        &mut self.raw
    }
}

impl<H: HandleTraits> Deref<Handle<H>> for UniqueHandle<H> {
    fn deref(&self) -> Handle<H> {
        self.handle()
    }
}
