//! Attribute caching on communicators and windows
//!
//! Attributes are user data attached to a communicator or window under a key. The key carries the
//! value type, so a [`KeyVal<T, A>`] can only store and retrieve `T`. Values are boxed and owned by
//! the MPI object: they are dropped when the attribute is deleted or replaced or the object is
//! freed. When a communicator is duplicated, values stored under keys made by [`create_keyval`]
//! are cloned into the duplicate, while values stored under keys made by
//! [`create_keyval_without_copy`] are left behind.
//!
//! # Standard section(s)
//!
//! 7.7

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::ptr;

use crate::error::{check_result, Error, Result};
use crate::ffi;
use crate::ffi::{MPI_Comm, MPI_Win};
use crate::handle::{Deref, Handle, HandleTraits, UniqueHandle};
use crate::raw::traits::*;

/// Attribute traits
pub mod traits {
    pub use super::{AttrDomain, AttributeStore};
}

/// The kind of MPI object attributes are attached to.
pub trait AttrDomain: Sized + 'static {
    /// Raw handle type of the objects
    type Object: Copy;

    /// Make a key whose values are cloned when the object is duplicated.
    fn create_keyval<T: Clone + 'static>() -> Result<c_int>;

    /// Make a key whose values are not propagated to duplicates.
    fn create_keyval_without_copy<T: 'static>() -> Result<c_int>;

    /// Release a key.
    fn free_keyval(key: &mut c_int) -> Result<()>;

    /// Attach `value` under `key`, replacing (and deleting) any previous value.
    fn set_attr(object: Self::Object, key: c_int, value: *mut c_void) -> Result<()>;

    /// The value stored under `key`, if any.
    fn get_attr(object: Self::Object, key: c_int) -> Result<Option<*mut c_void>>;

    /// Remove the value stored under `key`, invoking the key's delete procedure.
    fn delete_attr(object: Self::Object, key: c_int) -> Result<()>;
}

/// Attributes of communicators
#[derive(Debug)]
pub enum CommAttrs {}

/// Attributes of windows
#[derive(Debug)]
pub enum WinAttrs {}

unsafe fn clone_boxed<T: Clone>(val_in: *mut c_void, val_out: *mut c_void, flag: *mut c_int) {
    let value = &*(val_in as *const T);
    *(val_out as *mut *mut T) = Box::into_raw(Box::new(value.clone()));
    *flag = 1;
}

unsafe fn drop_boxed<T>(val: *mut c_void) {
    drop(Box::from_raw(val as *mut T));
}

macro_rules! attr_domain {
    (
        $domain:ident, $object:ty,
        create = $create:ident,
        free = $free:ident,
        set = $set:ident,
        get = $get:ident,
        delete = $delete:ident
    ) => {
        impl AttrDomain for $domain {
            type Object = $object;

            fn create_keyval<T: Clone + 'static>() -> Result<c_int> {
                unsafe extern "C" fn copy<T: Clone>(
                    _object: $object,
                    _key: c_int,
                    _extra_state: *mut c_void,
                    val_in: *mut c_void,
                    val_out: *mut c_void,
                    flag: *mut c_int,
                ) -> c_int {
                    clone_boxed::<T>(val_in, val_out, flag);
                    ffi::MPI_SUCCESS as c_int
                }

                let mut key: c_int = 0;
                check_result(unsafe {
                    ffi::$create(
                        Some(copy::<T>),
                        Some(delete::<T>),
                        &mut key,
                        ptr::null_mut(),
                    )
                })?;
                Ok(key)
            }

            fn create_keyval_without_copy<T: 'static>() -> Result<c_int> {
                unsafe extern "C" fn no_copy(
                    _object: $object,
                    _key: c_int,
                    _extra_state: *mut c_void,
                    _val_in: *mut c_void,
                    _val_out: *mut c_void,
                    flag: *mut c_int,
                ) -> c_int {
                    *flag = 0;
                    ffi::MPI_SUCCESS as c_int
                }

                let mut key: c_int = 0;
                check_result(unsafe {
                    ffi::$create(Some(no_copy), Some(delete::<T>), &mut key, ptr::null_mut())
                })?;
                Ok(key)
            }

            fn free_keyval(key: &mut c_int) -> Result<()> {
                check_result(unsafe { ffi::$free(key) })
            }

            fn set_attr(object: $object, key: c_int, value: *mut c_void) -> Result<()> {
                check_result(unsafe { ffi::$set(object, key, value) })
            }

            fn get_attr(object: $object, key: c_int) -> Result<Option<*mut c_void>> {
                let mut value: *mut c_void = ptr::null_mut();
                let mut flag: c_int = 0;
                check_result(unsafe {
                    ffi::$get(
                        object,
                        key,
                        &mut value as *mut *mut c_void as *mut c_void,
                        &mut flag,
                    )
                })?;
                Ok(if flag != 0 { Some(value) } else { None })
            }

            fn delete_attr(object: $object, key: c_int) -> Result<()> {
                check_result(unsafe { ffi::$delete(object, key) })
            }
        }

        unsafe extern "C" fn delete<T>(
            _object: $object,
            _key: c_int,
            val: *mut c_void,
            _extra_state: *mut c_void,
        ) -> c_int {
            drop_boxed::<T>(val);
            ffi::MPI_SUCCESS as c_int
        }
    };
}

mod comm_callbacks {
    use super::*;

    attr_domain!(
        CommAttrs,
        MPI_Comm,
        create = MPI_Comm_create_keyval,
        free = MPI_Comm_free_keyval,
        set = MPI_Comm_set_attr,
        get = MPI_Comm_get_attr,
        delete = MPI_Comm_delete_attr
    );
}

mod win_callbacks {
    use super::*;

    attr_domain!(
        WinAttrs,
        MPI_Win,
        create = MPI_Win_create_keyval,
        free = MPI_Win_free_keyval,
        set = MPI_Win_set_attr,
        get = MPI_Win_get_attr,
        delete = MPI_Win_delete_attr
    );
}

/// Handle traits of keys holding values of type `T` on objects of domain `A`
pub struct KeyvalHandle<T, A>(PhantomData<fn() -> (T, A)>);

impl<T, A: AttrDomain> HandleTraits for KeyvalHandle<T, A> {
    type Raw = c_int;

    fn null() -> c_int {
        unsafe { ffi::RSMPI_KEYVAL_INVALID }
    }

    fn destroy(raw: &mut c_int) -> Result<()> {
        A::free_keyval(raw)
    }
}

impl<T, A> fmt::Debug for KeyvalHandle<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyvalHandle")
    }
}

/// A reference to a key
pub type KeyVal<T, A = CommAttrs> = Handle<KeyvalHandle<T, A>>;

/// An owned key, freed on drop. Freeing a key does not remove values already stored under it.
pub type UniqueKeyVal<T, A = CommAttrs> = UniqueHandle<KeyvalHandle<T, A>>;

/// Make a key whose values are cloned into duplicates of the object.
pub fn create_keyval<T: Clone + 'static, A: AttrDomain>() -> Result<UniqueKeyVal<T, A>> {
    Ok(UniqueHandle::adopt(A::create_keyval::<T>()?))
}

/// Make a key whose values are not propagated to duplicates of the object.
pub fn create_keyval_without_copy<T: 'static, A: AttrDomain>() -> Result<UniqueKeyVal<T, A>> {
    Ok(UniqueHandle::adopt(A::create_keyval_without_copy::<T>()?))
}

/// An MPI object that stores attributes.
///
/// Values are handed out as clones, since the stored value can be replaced or deleted through any
/// copy of the object's handle.
pub trait AttributeStore {
    /// The domain of the object
    type Domain: AttrDomain;

    /// The raw object handle
    fn attr_object(&self) -> <Self::Domain as AttrDomain>::Object;

    /// A clone of the value stored under `key`, if any
    fn get_attr<T: Clone + 'static>(
        &self,
        key: &impl Deref<KeyVal<T, Self::Domain>>,
    ) -> Result<Option<T>> {
        Ok(unsafe { self.get_attr_ref(key)? }.cloned())
    }

    /// A reference to the value stored under `key`, if any
    ///
    /// # Safety
    ///
    /// The reference points into the object's attribute storage. It must not be used after the
    /// attribute is replaced or deleted, or after the object is freed, through this or any other
    /// handle to the same object.
    unsafe fn get_attr_ref<T: 'static>(
        &self,
        key: &impl Deref<KeyVal<T, Self::Domain>>,
    ) -> Result<Option<&T>> {
        let value = Self::Domain::get_attr(self.attr_object(), key.deref().as_raw())?;
        Ok(value.map(|value| &*(value as *const T)))
    }

    /// Store `value` under `key`, dropping any previous value
    fn set_attr<T: 'static>(
        &self,
        key: &impl Deref<KeyVal<T, Self::Domain>>,
        value: T,
    ) -> Result<()> {
        let boxed = Box::into_raw(Box::new(value));
        let res = Self::Domain::set_attr(self.attr_object(), key.deref().as_raw(), boxed as _);
        if res.is_err() {
            drop(unsafe { Box::from_raw(boxed) });
        }
        res
    }

    /// Store `value` under `key` and return a clone of the stored value
    fn create_attr<T: Clone + 'static>(
        &self,
        key: &impl Deref<KeyVal<T, Self::Domain>>,
        value: T,
    ) -> Result<T> {
        self.set_attr(key, value)?;
        self.get_attr(key)?
            .ok_or(Error::Logic("attribute missing right after it was set"))
    }

    /// Remove the value stored under `key`
    fn delete_attr<T: 'static>(&self, key: &impl Deref<KeyVal<T, Self::Domain>>) -> Result<()> {
        Self::Domain::delete_attr(self.attr_object(), key.deref().as_raw())
    }

    /// The raw attribute value stored under a predefined or foreign key
    fn get_attr_raw(&self, key: c_int) -> Result<Option<*mut c_void>> {
        Self::Domain::get_attr(self.attr_object(), key)
    }
}
