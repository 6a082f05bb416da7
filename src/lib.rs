//! Ownership-tagged handles for the Message Passing Interface
//!
//! The [Message Passing Interface][MPI] (MPI) hands out opaque handles for everything it manages:
//! communicators, groups, requests, windows, attribute keys, operators. Some of those handles
//! have to be freed by the program, some are predefined and must never be freed, and many are
//! passed around without ownership. This crate makes that distinction part of the type:
//!
//! - a reference (`Comm`, `Group`, `Request`, `Win<T>`, `KeyVal<T>`) is `Copy` and never frees,
//! - an owner (`UniqueComm`, `UniqueGroup`, `UniqueRequest`, `UniqueWin<T>`, `UniqueKeyVal<T>`)
//!   is move-only and frees its resource exactly once when dropped,
//! - predefined handles such as the world communicator or the builtin operators are never freed,
//!   whoever holds them.
//!
//! Every operation is available on both through the [`handle::Deref`] capability: communicator
//! operations are written once against "anything that derefs to a `Comm`".
//!
//! [MPI]: http://www.mpi-forum.org
//!
//! # Usage
//!
//! ```no_run
//! use mpi_handles::op::Op;
//! use mpi_handles::traits::*;
//!
//! let universe = mpi_handles::initialize().unwrap().unwrap();
//! let world = universe.world();
//!
//! let rank = world.rank().unwrap();
//! let size = world.size().unwrap();
//!
//! let ranks = world.all_gather(&[rank]).unwrap();
//! assert_eq!(ranks.len(), size as usize);
//!
//! let total = world.all_reduce(Op::sum(), rank).unwrap();
//! println!("rank {} of {}: sum of ranks is {}", rank, size, total);
//! ```
//!
//! # Features
//!
//! - **Environment**: initialization with threading levels, finalization through [`Universe`],
//!   library and processor information
//! - **Communicators**: rank and size, duplication, creation from groups, attributes, abort
//! - **Groups**: strided range inclusion and exclusion
//! - **Point to point**: blocking send and receive, immediate send, receive and probe
//! - **Collectives**: barrier, gather, all-gather, all-to-all, reduce, all-reduce, typed and
//!   dynamically typed
//! - **Requests**: scoped immediate operations, wait, test and batch completion
//! - **One-sided**: allocated windows with passive target synchronization, get and put
//! - **Clock**: `MPI_Wtime` as a monotonic clock

use std::os::raw::c_int;

/// The raw C language MPI API
///
/// Documented in the [Message Passing Interface specification][spec]
///
/// [spec]: http://www.mpi-forum.org/docs/docs.html
#[allow(missing_docs, dead_code, non_snake_case, non_camel_case_types)]
pub mod ffi {
    pub use mpi_handles_sys::*;
}

pub mod attribute;
pub mod clock;
pub mod comm;
pub mod datatype;
pub mod environment;
pub mod error;
pub mod group;
pub mod handle;
pub mod info;
pub mod op;
pub mod raw;
pub mod request;
pub mod status;
pub mod window;

/// Re-exports all traits.
pub mod traits {
    pub use crate::attribute::traits::*;
    pub use crate::comm::traits::*;
    pub use crate::datatype::traits::*;
    pub use crate::group::traits::*;
    pub use crate::handle::traits::*;
    pub use crate::op::traits::*;
    pub use crate::raw::traits::*;
    pub use crate::request::traits::*;
    pub use crate::window::traits::*;
}

pub use crate::environment::{initialize, initialize_with_threading, Threading, Universe};
pub use crate::error::{Error, Result};

/// Encodes number of values in multi-value messages.
pub type Count = c_int;
/// Can be used to tag messages on the sender side and match on the receiver side.
pub type Tag = c_int;
/// Identifies a process within a communicator or group.
pub type Rank = c_int;
/// An address in memory
pub type Address = ffi::MPI_Aint;
