//! Environmental management
//!
//! MPI has to be initialized before any other call and finalized after the last one. The
//! [`Universe`] returned by [`initialize`] stands for an initialized library: it hands out the
//! world communicator and finalizes MPI when dropped. Everything derived from it (communicators,
//! windows, requests, keys) must be gone by then.
//!
//! # Standard section(s)
//!
//! 8

use std::cmp::Ordering;
use std::os::raw::{c_char, c_int};
use std::ptr;

use conv::ConvUtil;
use log::debug;

use crate::comm::Comm;
use crate::error::{check_result, Result};
use crate::ffi;
use crate::raw::traits::*;

/// Global context
#[derive(Debug)]
pub struct Universe {
    threading: Threading,
}

impl Universe {
    /// The 'world communicator'
    ///
    /// Contains all processes initially partaking in the computation.
    pub fn world(&self) -> Comm {
        Comm::world()
    }

    /// The level of multithreading the library provides
    pub fn threading(&self) -> Threading {
        self.threading
    }
}

impl Drop for Universe {
    fn drop(&mut self) {
        debug!("finalizing MPI");
        unsafe {
            ffi::MPI_Finalize();
        }
    }
}

/// Describes the various levels of multithreading that can be supported by an MPI library.
///
/// # Standard section(s)
///
/// 12.4.3
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Threading {
    /// All processes partaking in the computation are single-threaded.
    Single,
    /// Processes may be multi-threaded, but MPI functions will only ever be called from the main
    /// thread.
    Funneled,
    /// Processes may be multi-threaded, but calls to MPI functions will not be made concurrently.
    /// The user is responsible for serializing the calls.
    Serialized,
    /// Processes may be multi-threaded with no restrictions on the use of MPI functions from the
    /// threads.
    Multiple,
}

impl Threading {
    fn as_raw(self) -> c_int {
        unsafe {
            match self {
                Threading::Single => ffi::RSMPI_THREAD_SINGLE,
                Threading::Funneled => ffi::RSMPI_THREAD_FUNNELED,
                Threading::Serialized => ffi::RSMPI_THREAD_SERIALIZED,
                Threading::Multiple => ffi::RSMPI_THREAD_MULTIPLE,
            }
        }
    }

    fn from_raw(level: c_int) -> Threading {
        [
            Threading::Multiple,
            Threading::Serialized,
            Threading::Funneled,
        ]
        .into_iter()
        .find(|threading| threading.as_raw() == level)
        .unwrap_or(Threading::Single)
    }
}

impl PartialOrd for Threading {
    fn partial_cmp(&self, other: &Threading) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Threading {
    fn cmp(&self, other: &Threading) -> Ordering {
        self.as_raw().cmp(&other.as_raw())
    }
}

/// Whether the MPI library has been initialized
pub fn is_initialized() -> Result<bool> {
    let mut res: c_int = 0;
    check_result(unsafe { ffi::MPI_Initialized(&mut res) })?;
    Ok(res != 0)
}

/// Whether the MPI library has been finalized
pub fn is_finalized() -> Result<bool> {
    let mut res: c_int = 0;
    check_result(unsafe { ffi::MPI_Finalized(&mut res) })?;
    Ok(res != 0)
}

/// Initialize MPI.
///
/// If the MPI library has not been initialized so far, initializes and returns a representation
/// of the MPI communication `Universe`. Otherwise returns `None`.
///
/// Equivalent to: `initialize_with_threading(Threading::Single)`
///
/// # Standard section(s)
///
/// 8.7
pub fn initialize() -> Result<Option<Universe>> {
    Ok(initialize_with_threading(Threading::Single)?.map(|(universe, _)| universe))
}

/// Initialize MPI with desired level of multithreading support.
///
/// If the MPI library has not been initialized so far, tries to initialize with the desired level
/// of multithreading support and returns the `Universe` as well as the level actually provided by
/// the implementation. Otherwise returns `None`.
///
/// Failing MPI calls on the world and self communicators, and on every communicator derived from
/// them, return error codes instead of aborting inside the library.
///
/// # Standard section(s)
///
/// 12.4.3
pub fn initialize_with_threading(threading: Threading) -> Result<Option<(Universe, Threading)>> {
    if is_initialized()? {
        return Ok(None);
    }
    let mut provided: c_int = 0;
    check_result(unsafe {
        ffi::MPI_Init_thread(
            ptr::null_mut(),
            ptr::null_mut(),
            threading.as_raw(),
            &mut provided,
        )
    })?;
    let provided = Threading::from_raw(provided);
    debug!("initialized MPI, requested {:?}, provided {:?}", threading, provided);

    let universe = Universe {
        threading: provided,
    };
    for comm in [Comm::world(), Comm::self_comm()] {
        check_result(unsafe {
            ffi::MPI_Comm_set_errhandler(comm.as_raw(), ffi::RSMPI_ERRORS_RETURN)
        })?;
    }
    Ok(Some((universe, provided)))
}

/// Level of multithreading supported by this MPI universe
pub fn threading_support() -> Result<Threading> {
    let mut res: c_int = 0;
    check_result(unsafe { ffi::MPI_Query_thread(&mut res) })?;
    Ok(Threading::from_raw(res))
}

/// Identifies the version of the MPI standard implemented by the library.
///
/// Returns a tuple of `(version, subversion)`, e.g. `(3, 1)`.
///
/// Can be called without initializing MPI.
pub fn version() -> Result<(c_int, c_int)> {
    let mut version: c_int = 0;
    let mut subversion: c_int = 0;
    check_result(unsafe { ffi::MPI_Get_version(&mut version, &mut subversion) })?;
    Ok((version, subversion))
}

/// Describes the version of the MPI library itself.
///
/// Can be called without initializing MPI.
pub fn library_version() -> Result<String> {
    read_string(unsafe { ffi::RSMPI_MAX_LIBRARY_VERSION_STRING }, |buf, len| unsafe {
        ffi::MPI_Get_library_version(buf, len)
    })
}

/// Names the processor that the calling process is running on.
pub fn processor_name() -> Result<String> {
    read_string(unsafe { ffi::RSMPI_MAX_PROCESSOR_NAME }, |buf, len| unsafe {
        ffi::MPI_Get_processor_name(buf, len)
    })
}

fn read_string(
    capacity: c_int,
    fill: impl FnOnce(*mut c_char, *mut c_int) -> c_int,
) -> Result<String> {
    let capacity: usize = capacity.value_as().unwrap_or(0);
    let mut buf = vec![0u8; capacity + 1];
    let mut len: c_int = 0;
    check_result(fill(buf.as_mut_ptr() as *mut c_char, &mut len))?;
    buf.truncate(len.value_as().unwrap_or(0));
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
