//! Groups of processes
//!
//! A group is an ordered set of process identifiers. Groups are obtained from communicators with
//! [`Communicator::group`](crate::comm::Communicator::group) and can be projected onto rank ranges
//! to build smaller groups, which in turn create communicators.

use std::os::raw::c_int;

use log::debug;

use crate::error::{check_result, count_of, Result};
use crate::ffi;
use crate::ffi::MPI_Group;
use crate::handle::{Deref, Handle, HandleTraits, UniqueHandle};
use crate::raw::traits::*;
use crate::Rank;

/// Group traits
pub mod traits {
    pub use super::GroupOps;
}

/// Handle traits of `MPI_Group`. The empty group is a system handle.
#[derive(Debug)]
pub enum GroupHandle {}

impl HandleTraits for GroupHandle {
    type Raw = MPI_Group;

    fn null() -> MPI_Group {
        unsafe { ffi::RSMPI_GROUP_NULL }
    }

    fn destroy(raw: &mut MPI_Group) -> Result<()> {
        check_result(unsafe { ffi::MPI_Group_free(raw) })
    }

    fn is_system_handle(raw: MPI_Group) -> bool {
        raw == unsafe { ffi::RSMPI_GROUP_EMPTY }
    }
}

/// A reference to a group
pub type Group = Handle<GroupHandle>;

/// An owned group, freed on drop
pub type UniqueGroup = UniqueHandle<GroupHandle>;

impl Group {
    /// The predefined empty group
    pub fn empty() -> Group {
        unsafe { Group::from_raw(ffi::RSMPI_GROUP_EMPTY) }
    }
}

/// A strided range of ranks, `first`, `first + stride`, ... up to and including `last`.
///
/// Has the layout of the `int[3]` triples expected by `MPI_Group_range_incl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupRange {
    /// First rank of the range
    pub first: Rank,
    /// Last rank of the range, inclusive
    pub last: Rank,
    /// Distance between consecutive ranks
    pub stride: c_int,
}

impl Default for GroupRange {
    fn default() -> Self {
        GroupRange {
            first: 0,
            last: -1,
            stride: 1,
        }
    }
}

impl GroupRange {
    /// The ranks `from..=to`
    pub fn unit_stride(from: Rank, to: Rank) -> Self {
        GroupRange {
            first: from,
            last: to,
            stride: 1,
        }
    }

    fn to_triple(self) -> [c_int; 3] {
        [self.first, self.last, self.stride]
    }
}

impl From<std::ops::RangeInclusive<Rank>> for GroupRange {
    fn from(range: std::ops::RangeInclusive<Rank>) -> Self {
        GroupRange::unit_stride(*range.start(), *range.end())
    }
}

type RangeFn = unsafe extern "C" fn(MPI_Group, c_int, *mut [c_int; 3], *mut MPI_Group) -> c_int;

/// Operations shared by group references and owners.
pub trait GroupOps: Deref<Group> {
    /// Number of processes in the group
    ///
    /// # Standard section(s)
    ///
    /// 6.3.1
    fn size(&self) -> Result<Rank> {
        let mut size: c_int = 0;
        check_result(unsafe { ffi::MPI_Group_size(self.deref().as_raw(), &mut size) })?;
        Ok(size)
    }

    /// The rank of the calling process in the group, if it is a member
    ///
    /// # Standard section(s)
    ///
    /// 6.3.1
    fn rank(&self) -> Result<Option<Rank>> {
        let mut rank: c_int = 0;
        check_result(unsafe { ffi::MPI_Group_rank(self.deref().as_raw(), &mut rank) })?;
        Ok(if rank == unsafe { ffi::RSMPI_UNDEFINED } {
            None
        } else {
            Some(rank)
        })
    }

    /// Whether this is the empty group
    fn is_empty(&self) -> bool {
        self.deref().as_raw() == unsafe { ffi::RSMPI_GROUP_EMPTY }
    }

    /// A new group containing the members selected by `ranges`, in order
    ///
    /// # Standard section(s)
    ///
    /// 6.3.2
    fn range_incl(&self, ranges: &[GroupRange]) -> Result<UniqueGroup> {
        project(self.deref(), ranges, ffi::MPI_Group_range_incl)
    }

    /// A new group containing the ranks `from..=to`
    fn range_incl_unit(&self, from: Rank, to: Rank) -> Result<UniqueGroup> {
        self.range_incl(&[GroupRange::unit_stride(from, to)])
    }

    /// A new group without the members selected by `ranges`
    ///
    /// # Standard section(s)
    ///
    /// 6.3.2
    fn range_excl(&self, ranges: &[GroupRange]) -> Result<UniqueGroup> {
        project(self.deref(), ranges, ffi::MPI_Group_range_excl)
    }

    /// A new group without the ranks `from..=to`
    fn range_excl_unit(&self, from: Rank, to: Rank) -> Result<UniqueGroup> {
        self.range_excl(&[GroupRange::unit_stride(from, to)])
    }
}

impl GroupOps for Group {}
impl GroupOps for UniqueGroup {}

fn project(group: Group, ranges: &[GroupRange], f: RangeFn) -> Result<UniqueGroup> {
    let n = count_of("group ranges", ranges.len())?;
    let mut triples: Vec<[c_int; 3]> = ranges.iter().map(|r| r.to_triple()).collect();
    let mut out = UniqueGroup::null();
    check_result(unsafe { f(group.as_raw(), n, triples.as_mut_ptr(), out.as_raw_mut()) })?;
    debug!("projected group over {} range(s)", ranges.len());
    Ok(out)
}
