//! MPI error handling and constants
//!
//! Every wrapped call funnels its return code through [`check_result`]. Caller mistakes that only
//! concern the calling process surface as [`Error::OutOfRange`] or [`Error::Logic`]. Mistakes that
//! would desynchronize a collective abort the communicator instead (see the `comm` module), and
//! resource lifecycle violations abort the process.

use std::os::raw::{c_char, c_int};

use conv::ConvUtil;
use thiserror::Error;

use crate::{ffi, Count};

/// MPI_SUCCESS constant, cast as a c_int here for easier checking of MPI return values
pub const MPI_SUCCESS: c_int = ffi::MPI_SUCCESS as c_int;

macro_rules! build_error_kind {
    {
        $(#[$doc:meta])*
        pub enum $name:ident {
            $(
                 #[$err_doc:meta]
                 #[err($mpi_err:ident)]
                 $rust_err:ident,
            )*
        }
    } => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $(
            #[$err_doc]
            $rust_err,
            )*
        }

        impl $name {
            /// Map a raw MPI return code onto its error class.
            ///
            /// Codes whose class is not listed here, or whose class cannot be determined, map to
            /// `Unknown`.
            pub(crate) fn from_code(code: c_int) -> $name {
                let mut class: c_int = 0;
                let res = unsafe { ffi::MPI_Error_class(code, &mut class) };
                if res != MPI_SUCCESS {
                    return $name::Unknown;
                }
                $(
                if class == ffi::$mpi_err as c_int {
                    return $name::$rust_err;
                }
                )*
                $name::Unknown
            }
        }
    }
}

build_error_kind! {
    /// Error classes reported by the MPI library that the wrapped operations can produce.
    pub enum ErrorKind {
        /// Invalid argument of some other kind
        #[err(MPI_ERR_ARG)]
        Arg,
        /// Invalid assertion argument
        #[err(MPI_ERR_ASSERT)]
        Assert,
        /// Invalid buffer pointer argument
        #[err(MPI_ERR_BUFFER)]
        Buffer,
        /// Invalid communicator argument
        #[err(MPI_ERR_COMM)]
        Comm,
        /// Invalid count argument
        #[err(MPI_ERR_COUNT)]
        Count,
        /// Invalid displacement argument
        #[err(MPI_ERR_DISP)]
        Disp,
        /// Invalid group argument
        #[err(MPI_ERR_GROUP)]
        Group,
        /// Invalid info argument
        #[err(MPI_ERR_INFO)]
        Info,
        /// Error code is in status
        #[err(MPI_ERR_IN_STATUS)]
        InStatus,
        /// Internal MPI (implementation) error
        #[err(MPI_ERR_INTERN)]
        Intern,
        /// Invalid keyval argument
        #[err(MPI_ERR_KEYVAL)]
        Keyval,
        /// Memory is exhausted
        #[err(MPI_ERR_NO_MEM)]
        NoMem,
        /// Collective argument not identical on all processes
        #[err(MPI_ERR_NOT_SAME)]
        NotSame,
        /// Invalid operation argument
        #[err(MPI_ERR_OP)]
        Op,
        /// Known error not in this list
        #[err(MPI_ERR_OTHER)]
        Other,
        /// Pending request
        #[err(MPI_ERR_PENDING)]
        Pending,
        /// Invalid rank argument
        #[err(MPI_ERR_RANK)]
        Rank,
        /// Invalid request argument
        #[err(MPI_ERR_REQUEST)]
        Request,
        /// Conflicting accesses to window
        #[err(MPI_ERR_RMA_CONFLICT)]
        RmaConflict,
        /// Target memory is not part of the window
        #[err(MPI_ERR_RMA_RANGE)]
        RmaRange,
        /// Wrong synchronization of RMA calls
        #[err(MPI_ERR_RMA_SYNC)]
        RmaSync,
        /// Invalid root argument
        #[err(MPI_ERR_ROOT)]
        Root,
        /// Invalid size argument
        #[err(MPI_ERR_SIZE)]
        Size,
        /// Invalid tag argument
        #[err(MPI_ERR_TAG)]
        Tag,
        /// Message truncated on receive
        #[err(MPI_ERR_TRUNCATE)]
        Truncate,
        /// Invalid datatype argument
        #[err(MPI_ERR_TYPE)]
        Type,
        /// Unknown error
        #[err(MPI_ERR_UNKNOWN)]
        Unknown,
        /// Invalid window argument
        #[err(MPI_ERR_WIN)]
        Win,
    }
}

/// A non-success return code of the MPI library.
///
/// The message is fetched from `MPI_Error_string` when the error is constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("MPI error {code} ({kind:?}): {message}")]
pub struct MpiError {
    code: c_int,
    kind: ErrorKind,
    message: String,
}

impl MpiError {
    /// Describe the raw return code `code`.
    pub fn from_code(code: c_int) -> Self {
        MpiError {
            code,
            kind: ErrorKind::from_code(code),
            message: error_string(code),
        }
    }

    /// The raw return code.
    pub fn code(&self) -> c_int {
        self.code
    }

    /// The error class of the return code.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The library's description of the return code.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by the fallible operations of this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The MPI library reported a failure
    #[error(transparent)]
    Mpi(#[from] MpiError),

    /// A buffer is too long to be described by an MPI count
    #[error("{what} holds {len} elements, which exceeds the range of an MPI count")]
    OutOfRange {
        /// Which argument overflowed
        what: &'static str,
        /// The offending length
        len: usize,
    },

    /// The arguments of a call are inconsistent with each other
    #[error("{0}")]
    Logic(&'static str),
}

impl Error {
    /// The raw MPI return code, if this error came from the library.
    pub fn code(&self) -> Option<c_int> {
        match self {
            Error::Mpi(err) => Some(err.code()),
            _ => None,
        }
    }
}

/// Result type of the fallible operations of this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Turn an MPI return code into a `Result`.
pub fn check_result(code: c_int) -> Result<()> {
    if code == MPI_SUCCESS {
        Ok(())
    } else {
        Err(MpiError::from_code(code).into())
    }
}

/// Convert a buffer length into an MPI count.
pub(crate) fn count_of(what: &'static str, len: usize) -> Result<Count> {
    len.value_as::<Count>()
        .map_err(|_| Error::OutOfRange { what, len })
}

/// Print `message` and terminate the process.
///
/// Used where the library's internal bookkeeping may already be inconsistent, so unwinding is not
/// an option.
pub(crate) fn fatal(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::abort()
}

fn error_string(code: c_int) -> String {
    let capacity: usize = unsafe { ffi::RSMPI_MAX_ERROR_STRING }
        .value_as()
        .unwrap_or(0);
    let mut buf = vec![0u8; capacity.max(1)];
    let mut len: c_int = 0;
    let res = unsafe { ffi::MPI_Error_string(code, buf.as_mut_ptr() as *mut c_char, &mut len) };
    if res != MPI_SUCCESS {
        return format!("unrecognized error code {}", code);
    }
    buf.truncate(len.value_as::<usize>().unwrap_or(0).min(capacity));
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_ok() {
        assert!(check_result(MPI_SUCCESS).is_ok());
    }

    #[test]
    fn count_overflow_is_out_of_range() {
        assert_eq!(count_of("send buffer", 7), Ok(7));
        let len = Count::MAX as usize + 1;
        assert_eq!(
            count_of("send buffer", len),
            Err(Error::OutOfRange {
                what: "send buffer",
                len
            })
        );
    }

    #[test]
    fn logic_error_displays_its_message() {
        let err = Error::Logic("statuses must be at least as long as requests");
        assert_eq!(
            err.to_string(),
            "statuses must be at least as long as requests"
        );
        assert_eq!(err.code(), None);
    }
}
