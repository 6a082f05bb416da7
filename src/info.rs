//! Info objects, hints passed to object constructors such as window allocation

use std::ffi::CString;

use crate::error::{check_result, Error, Result};
use crate::ffi;
use crate::ffi::MPI_Info;
use crate::handle::{Handle, HandleTraits, UniqueHandle};
use crate::raw::traits::*;

/// Handle traits of `MPI_Info`
#[derive(Debug)]
pub enum InfoHandle {}

impl HandleTraits for InfoHandle {
    type Raw = MPI_Info;

    fn null() -> MPI_Info {
        unsafe { ffi::RSMPI_INFO_NULL }
    }

    fn destroy(raw: &mut MPI_Info) -> Result<()> {
        check_result(unsafe { ffi::MPI_Info_free(raw) })
    }
}

/// A reference to an info object. The null info passes no hints.
pub type Info = Handle<InfoHandle>;

/// An owned info object, freed on drop
pub type UniqueInfo = UniqueHandle<InfoHandle>;

impl UniqueInfo {
    /// A new, empty info object
    ///
    /// # Standard section(s)
    ///
    /// 9
    pub fn create() -> Result<UniqueInfo> {
        let mut info = UniqueInfo::null();
        check_result(unsafe { ffi::MPI_Info_create(info.as_raw_mut()) })?;
        Ok(info)
    }

    /// Add the hint `key = value`, replacing an earlier value of `key`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = CString::new(key).map_err(|_| Error::Logic("info key contains a NUL byte"))?;
        let value =
            CString::new(value).map_err(|_| Error::Logic("info value contains a NUL byte"))?;
        check_result(unsafe { ffi::MPI_Info_set(self.as_raw(), key.as_ptr(), value.as_ptr()) })
    }
}
