//! Message status

use std::fmt;
use std::os::raw::c_int;

use crate::error::MPI_SUCCESS;
use crate::ffi;
use crate::ffi::MPI_Status;
use crate::{Rank, Tag};

/// Describes the result of a completed point to point operation.
///
/// Has the layout of `MPI_Status`, so slices of `Status` can be handed to the library directly.
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct Status(MPI_Status);

impl Status {
    /// Construct a `Status` value from the raw MPI type
    pub fn from_raw(status: MPI_Status) -> Status {
        Status(status)
    }

    /// The rank of the message source
    pub fn source(&self) -> Rank {
        self.0.MPI_SOURCE
    }

    /// The message tag
    pub fn tag(&self) -> Tag {
        self.0.MPI_TAG
    }

    /// The error code stored in the status
    pub fn error(&self) -> c_int {
        self.0.MPI_ERROR
    }

    /// Whether the error code is `MPI_SUCCESS`
    pub fn success(&self) -> bool {
        self.error() == MPI_SUCCESS
    }

    pub(crate) fn as_raw_mut(&mut self) -> *mut MPI_Status {
        &mut self.0
    }
}

impl Default for Status {
    /// Any source, any tag, success.
    fn default() -> Self {
        let mut status: MPI_Status = unsafe { std::mem::zeroed() };
        status.MPI_SOURCE = unsafe { ffi::RSMPI_ANY_SOURCE };
        status.MPI_TAG = unsafe { ffi::RSMPI_ANY_TAG };
        status.MPI_ERROR = MPI_SUCCESS;
        Status(status)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Status")
            .field("source", &self.source())
            .field("tag", &self.tag())
            .field("error", &self.error())
            .finish()
    }
}
