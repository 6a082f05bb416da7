//! One-sided communication through memory windows
//!
//! [`UniqueWin::allocate`] collectively allocates a region of `count` elements on every process of
//! a communicator. Remote regions are read and written with `get` and `put` inside an access epoch
//! opened with `lock` or `lock_all` and closed with `unlock` or `unlock_all`. Epochs are entirely
//! up to the caller; an operation outside an epoch fails with the library's error, since every
//! window is allocated with `MPI_ERRORS_RETURN` as its error handler.
//!
//! The local region of an owned window can be indexed and iterated like a slice.
//!
//! # Standard section(s)
//!
//! 11

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Index, IndexMut};
use std::os::raw::{c_int, c_void};
use std::{ptr, slice};

use conv::ConvUtil;

use crate::attribute::{AttrDomain, AttributeStore, WinAttrs};
use crate::comm::Comm;
use crate::datatype::Equivalence;
use crate::error::{check_result, count_of, Error, Result};
use crate::ffi;
use crate::ffi::{MPI_Aint, MPI_Win};
use crate::handle::{Deref, Handle, HandleTraits, UniqueHandle};
use crate::info::Info;
use crate::raw::traits::*;
use crate::Rank;

/// Window traits
pub mod traits {
    pub use super::Window;
}

/// Handle traits of `MPI_Win`
#[derive(Debug)]
pub enum WinHandle {}

impl HandleTraits for WinHandle {
    type Raw = MPI_Win;

    fn null() -> MPI_Win {
        unsafe { ffi::RSMPI_WIN_NULL }
    }

    fn destroy(raw: &mut MPI_Win) -> Result<()> {
        check_result(unsafe { ffi::MPI_Win_free(raw) })
    }
}

/// Kind of lock taken on a target's region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockType {
    /// No other process may access the region concurrently
    Exclusive,
    /// Other shared locks may be held concurrently
    Shared,
}

impl LockType {
    fn as_raw(self) -> c_int {
        match self {
            LockType::Exclusive => unsafe { ffi::RSMPI_LOCK_EXCLUSIVE },
            LockType::Shared => unsafe { ffi::RSMPI_LOCK_SHARED },
        }
    }
}

/// Promises made when taking a lock
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LockAssert {
    /// No promise
    #[default]
    None,
    /// No other process holds or will try to take a conflicting lock during the epoch
    NoCheck,
}

impl LockAssert {
    fn as_raw(self) -> c_int {
        match self {
            LockAssert::None => 0,
            LockAssert::NoCheck => unsafe { ffi::RSMPI_MODE_NOCHECK },
        }
    }
}

/// A reference to a window of elements of type `T`
pub struct Win<T> {
    handle: Handle<WinHandle>,
    phantom: PhantomData<*mut T>,
}

impl<T> Win<T> {
    /// Wrap a raw window handle without taking ownership.
    ///
    /// # Safety
    ///
    /// `win` must be null or a valid window whose displacement unit is `size_of::<T>()`.
    pub unsafe fn from_raw(win: MPI_Win) -> Self {
        Win {
            handle: Handle::from_raw(win),
            phantom: PhantomData,
        }
    }

    /// Whether this refers to nothing
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }
}

impl<T> Clone for Win<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Win<T> {}

impl<T> fmt::Debug for Win<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Win").field(&self.handle.as_raw()).finish()
    }
}

unsafe impl<T> AsRaw for Win<T> {
    type Raw = MPI_Win;
    fn as_raw(&self) -> MPI_Win {
        self.handle.as_raw()
    }
}

impl<T> Deref<Win<T>> for Win<T> {
    fn deref(&self) -> Win<T> {
        *self
    }
}

impl<T: 'static> AttributeStore for Win<T> {
    type Domain = WinAttrs;
    fn attr_object(&self) -> MPI_Win {
        self.as_raw()
    }
}

impl<T: Equivalence> Window<T> for Win<T> {}

/// An owned window, freed (collectively) on drop
pub struct UniqueWin<T> {
    handle: UniqueHandle<WinHandle>,
    base: *mut T,
    len: usize,
}

impl<T: Equivalence> UniqueWin<T> {
    /// Collectively allocate a window of `count` zeroed elements on every process of `comm`
    ///
    /// # Standard section(s)
    ///
    /// 11.2.2
    pub fn allocate(comm: &impl Deref<Comm>, count: usize) -> Result<Self> {
        Self::allocate_with_info(comm, count, &Info::null())
    }

    /// Like [`UniqueWin::allocate`], passing implementation hints
    pub fn allocate_with_info(
        comm: &impl Deref<Comm>,
        count: usize,
        info: &impl Deref<Info>,
    ) -> Result<Self> {
        let too_long = Error::OutOfRange {
            what: "window",
            len: count,
        };
        let bytes: MPI_Aint = count
            .checked_mul(mem::size_of::<T>())
            .and_then(|bytes| bytes.value_as().ok())
            .ok_or(too_long)?;
        let disp_unit = count_of("window element size", mem::size_of::<T>())?;

        let mut base: *mut T = ptr::null_mut();
        let mut handle = UniqueHandle::<WinHandle>::null();
        check_result(unsafe {
            ffi::MPI_Win_allocate(
                bytes,
                disp_unit,
                info.deref().as_raw(),
                comm.deref().as_raw(),
                &mut base as *mut *mut T as *mut c_void,
                handle.as_raw_mut(),
            )
        })?;
        check_result(unsafe {
            ffi::MPI_Win_set_errhandler(handle.as_raw(), ffi::RSMPI_ERRORS_RETURN)
        })?;
        if count > 0 {
            unsafe { ptr::write_bytes(base, 0, count) };
        }
        Ok(UniqueWin {
            handle,
            base,
            len: count,
        })
    }
}

impl<T> UniqueWin<T> {
    /// The local region
    pub fn local(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        unsafe { slice::from_raw_parts(self.base, self.len) }
    }

    /// The local region, mutably
    pub fn local_mut(&mut self) -> &mut [T] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { slice::from_raw_parts_mut(self.base, self.len) }
    }

    /// Iterate over the local region
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.local().iter()
    }

    /// Iterate mutably over the local region
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.local_mut().iter_mut()
    }

    /// Number of local elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the local region is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free the window now instead of on drop
    pub fn free(mut self) -> Result<()> {
        self.handle.reset()
    }
}

impl<T> Index<usize> for UniqueWin<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.local()[index]
    }
}

impl<T> IndexMut<usize> for UniqueWin<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.local_mut()[index]
    }
}

impl<'a, T> IntoIterator for &'a UniqueWin<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> fmt::Debug for UniqueWin<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueWin")
            .field("handle", &self.handle)
            .field("len", &self.len)
            .finish()
    }
}

unsafe impl<T> AsRaw for UniqueWin<T> {
    type Raw = MPI_Win;
    fn as_raw(&self) -> MPI_Win {
        self.handle.as_raw()
    }
}

impl<T> Deref<Win<T>> for UniqueWin<T> {
    fn deref(&self) -> Win<T> {
        Win {
            handle: self.handle.handle(),
            phantom: PhantomData,
        }
    }
}

impl<T: 'static> AttributeStore for UniqueWin<T> {
    type Domain = WinAttrs;
    fn attr_object(&self) -> MPI_Win {
        self.as_raw()
    }
}

impl<T: Equivalence> Window<T> for UniqueWin<T> {}

/// One-sided operations, implemented by [`Win`] and [`UniqueWin`]
pub trait Window<T: Equivalence>: Deref<Win<T>> {
    /// Start of the local region (`MPI_WIN_BASE`)
    fn base(&self) -> Result<*mut T> {
        let base = WinAttrs::get_attr(self.deref().as_raw(), unsafe { ffi::RSMPI_WIN_BASE })?;
        Ok(base.map_or(ptr::null_mut(), |base| base as *mut T))
    }

    /// Number of local elements, derived from `MPI_WIN_SIZE`
    fn size(&self) -> Result<usize> {
        let size = WinAttrs::get_attr(self.deref().as_raw(), unsafe { ffi::RSMPI_WIN_SIZE })?;
        let bytes = match size {
            Some(size) => unsafe { *(size as *const MPI_Aint) },
            None => 0,
        };
        let bytes: usize = bytes.value_as().unwrap_or(0);
        Ok(bytes / mem::size_of::<T>().max(1))
    }

    /// Start an access epoch on the region of `rank`
    ///
    /// # Standard section(s)
    ///
    /// 11.5.3
    fn lock(&self, lock_type: LockType, rank: Rank, assert: LockAssert) -> Result<()> {
        check_result(unsafe {
            ffi::MPI_Win_lock(
                lock_type.as_raw(),
                rank,
                assert.as_raw(),
                self.deref().as_raw(),
            )
        })
    }

    /// Start a shared access epoch on all regions
    fn lock_all(&self, assert: LockAssert) -> Result<()> {
        check_result(unsafe { ffi::MPI_Win_lock_all(assert.as_raw(), self.deref().as_raw()) })
    }

    /// End the access epoch on the region of `rank`, completing all operations on it
    fn unlock(&self, rank: Rank) -> Result<()> {
        check_result(unsafe { ffi::MPI_Win_unlock(rank, self.deref().as_raw()) })
    }

    /// End the access epoch started with `lock_all`
    fn unlock_all(&self) -> Result<()> {
        check_result(unsafe { ffi::MPI_Win_unlock_all(self.deref().as_raw()) })
    }

    /// Complete all outstanding operations at their targets without ending the epoch
    ///
    /// # Standard section(s)
    ///
    /// 11.5.4
    fn flush_all(&self) -> Result<()> {
        check_result(unsafe { ffi::MPI_Win_flush_all(self.deref().as_raw()) })
    }

    /// Read `origin.len()` elements from the region of `target`, starting at element `disp`
    ///
    /// Returns once `origin` holds the data.
    ///
    /// # Standard section(s)
    ///
    /// 11.3.2
    fn get(&self, origin: &mut [T], target: Rank, disp: usize) -> Result<()> {
        let count = count_of("get buffer", origin.len())?;
        let disp = displacement(disp)?;
        let datatype = T::equivalent_datatype().as_raw();
        let win = self.deref().as_raw();
        check_result(unsafe {
            ffi::MPI_Get(
                origin.as_mut_ptr() as *mut c_void,
                count,
                datatype,
                target,
                disp,
                count,
                datatype,
                win,
            )
        })?;
        check_result(unsafe { ffi::MPI_Win_flush_local(target, win) })
    }

    /// Write `origin` into the region of `target`, starting at element `disp`
    ///
    /// Returns once `origin` may be reused. The data is visible at the target after `unlock` or
    /// a flush.
    ///
    /// # Standard section(s)
    ///
    /// 11.3.1
    fn put(&self, origin: &[T], target: Rank, disp: usize) -> Result<()> {
        let count = count_of("put buffer", origin.len())?;
        let disp = displacement(disp)?;
        let datatype = T::equivalent_datatype().as_raw();
        let win = self.deref().as_raw();
        check_result(unsafe {
            ffi::MPI_Put(
                origin.as_ptr() as *const c_void,
                count,
                datatype,
                target,
                disp,
                count,
                datatype,
                win,
            )
        })?;
        check_result(unsafe { ffi::MPI_Win_flush_local(target, win) })
    }
}

fn displacement(disp: usize) -> Result<MPI_Aint> {
    disp.value_as().map_err(|_| Error::OutOfRange {
        what: "displacement",
        len: disp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_assert_defaults_to_no_promise() {
        assert_eq!(LockAssert::default(), LockAssert::None);
        assert_eq!(LockAssert::None.as_raw(), 0);
    }

    #[test]
    fn null_window_reference() {
        let win = unsafe { Win::<f64>::from_raw(WinHandle::null()) };
        assert!(win.is_null());
    }
}
