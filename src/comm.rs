//! Communicators
//!
//! A communicator is a group of processes plus a context for message matching. [`Comm`] refers to
//! a communicator without owning it; [`UniqueComm`] owns one and frees it on drop. Both implement
//! [`Communicator`], whose provided methods are the operations of this module, so code written
//! against `impl Communicator` (or `impl Deref<Comm>`) accepts either.
//!
//! # Collective contracts
//!
//! The collective operations check their arguments before entering the library. A root outside
//! the communicator, a root-only call made on another rank, a missing receive buffer on the root
//! or a receive buffer that is too small would leave the other ranks blocked in the matching call,
//! so these violations print a diagnostic and abort the whole communicator. A buffer too long to
//! be described by an MPI count only concerns the caller and is reported as
//! [`Error::OutOfRange`](crate::Error::OutOfRange).

use std::os::raw::{c_int, c_void};
use std::{process, ptr};

use log::debug;

use crate::attribute::{AttrDomain, AttributeStore, CommAttrs};
use crate::datatype::{DynBuffer, DynBufferMut, Equivalence};
use crate::error::{check_result, count_of, Result};
use crate::ffi;
use crate::ffi::MPI_Comm;
use crate::group::{Group, UniqueGroup};
use crate::handle::{Deref, Handle, HandleTraits, UniqueHandle};
use crate::op::{Op, Operand};
use crate::raw::traits::*;
use crate::request::{Scope, UniqueRequest};
use crate::status::Status;
use crate::{Rank, Tag};

/// Communicator traits
pub mod traits {
    pub use super::Communicator;
}

/// Exit code used when a collective contract is violated
pub const EXIT_FAILURE: c_int = 1;

/// Handle traits of `MPI_Comm`. `MPI_COMM_WORLD` and `MPI_COMM_SELF` are system handles.
#[derive(Debug)]
pub enum CommHandle {}

impl HandleTraits for CommHandle {
    type Raw = MPI_Comm;

    fn null() -> MPI_Comm {
        unsafe { ffi::RSMPI_COMM_NULL }
    }

    fn destroy(raw: &mut MPI_Comm) -> Result<()> {
        check_result(unsafe { ffi::MPI_Comm_free(raw) })
    }

    fn is_system_handle(raw: MPI_Comm) -> bool {
        unsafe { raw == ffi::RSMPI_COMM_WORLD || raw == ffi::RSMPI_COMM_SELF }
    }
}

/// A reference to a communicator
pub type Comm = Handle<CommHandle>;

/// An owned communicator, freed on drop
pub type UniqueComm = UniqueHandle<CommHandle>;

impl Comm {
    /// `MPI_COMM_WORLD`, all processes of the computation
    pub fn world() -> Comm {
        unsafe { Comm::from_raw(ffi::RSMPI_COMM_WORLD) }
    }

    /// `MPI_COMM_SELF`, only the calling process
    pub fn self_comm() -> Comm {
        unsafe { Comm::from_raw(ffi::RSMPI_COMM_SELF) }
    }
}

impl AttributeStore for Comm {
    type Domain = CommAttrs;
    fn attr_object(&self) -> MPI_Comm {
        self.as_raw()
    }
}

impl AttributeStore for UniqueComm {
    type Domain = CommAttrs;
    fn attr_object(&self) -> MPI_Comm {
        self.as_raw()
    }
}

impl Communicator for Comm {}
impl Communicator for UniqueComm {}

fn violation(comm: MPI_Comm, message: &str) -> ! {
    eprintln!("{}", message);
    unsafe {
        ffi::MPI_Abort(comm, EXIT_FAILURE);
    }
    process::abort()
}

fn send_ptr<T>(buf: &[T]) -> *const c_void {
    buf.as_ptr() as *const c_void
}

fn recv_ptr<T>(buf: Option<&mut [T]>) -> *mut c_void {
    buf.map_or(ptr::null_mut(), |buf| buf.as_mut_ptr() as *mut c_void)
}

/// A vector of `len` copies of the first element of `template`, which is non-empty unless
/// `len` is zero.
fn filled<T: Copy>(template: &[T], len: usize) -> Vec<T> {
    match template.first() {
        Some(&value) => vec![value; len],
        None => Vec::new(),
    }
}

/// Operations on intra-communicators.
///
/// All methods are provided. They are implemented by [`Comm`] and [`UniqueComm`].
pub trait Communicator: Deref<Comm> {
    /// The raw handle
    fn raw(&self) -> MPI_Comm {
        self.deref().as_raw()
    }

    /// Number of processes in this communicator
    ///
    /// # Standard section(s)
    ///
    /// 6.4.1
    fn size(&self) -> Result<Rank> {
        let mut size: c_int = 0;
        check_result(unsafe { ffi::MPI_Comm_size(self.raw(), &mut size) })?;
        Ok(size)
    }

    /// The rank that identifies the calling process within this communicator
    ///
    /// # Standard section(s)
    ///
    /// 6.4.1
    fn rank(&self) -> Result<Rank> {
        let mut rank: c_int = 0;
        check_result(unsafe { ffi::MPI_Comm_rank(self.raw(), &mut rank) })?;
        Ok(rank)
    }

    /// The group of processes of this communicator
    ///
    /// # Standard section(s)
    ///
    /// 6.3.2
    fn group(&self) -> Result<UniqueGroup> {
        let mut group = UniqueGroup::null();
        check_result(unsafe { ffi::MPI_Comm_group(self.raw(), group.as_raw_mut()) })?;
        Ok(group)
    }

    /// Duplicate the communicator. Attributes are copied according to their keys.
    ///
    /// # Standard section(s)
    ///
    /// 6.4.2
    fn dup(&self) -> Result<UniqueComm> {
        let mut comm = UniqueComm::null();
        check_result(unsafe { ffi::MPI_Comm_dup(self.raw(), comm.as_raw_mut()) })?;
        debug!("duplicated communicator into {:?}", comm);
        Ok(comm)
    }

    /// A new communicator over the members of `group`, a subset of this communicator's group.
    ///
    /// Collective over this communicator. Processes outside `group` receive a null communicator.
    ///
    /// # Standard section(s)
    ///
    /// 6.4.2
    fn create(&self, group: &impl Deref<Group>) -> Result<UniqueComm> {
        let mut comm = UniqueComm::null();
        check_result(unsafe {
            ffi::MPI_Comm_create(self.raw(), group.deref().as_raw(), comm.as_raw_mut())
        })?;
        debug!("created communicator {:?}", comm);
        Ok(comm)
    }

    /// Abort all processes of this communicator with `error_code`.
    ///
    /// # Standard section(s)
    ///
    /// 8.7
    fn abort(&self, error_code: c_int) -> ! {
        unsafe {
            ffi::MPI_Abort(self.raw(), error_code);
        }
        process::abort()
    }

    /// The largest usable tag value (`MPI_TAG_UB`)
    ///
    /// # Standard section(s)
    ///
    /// 8.1.2
    fn tag_ub(&self) -> Result<Tag> {
        match CommAttrs::get_attr(self.raw(), unsafe { ffi::RSMPI_TAG_UB })? {
            Some(value) => Ok(unsafe { *(value as *const c_int) }),
            None => violation(self.raw(), "MPI_TAG_UB is not set on this communicator"),
        }
    }

    /// Block until all processes have entered the barrier
    ///
    /// # Standard section(s)
    ///
    /// 5.3
    fn barrier(&self) -> Result<()> {
        check_result(unsafe { ffi::MPI_Barrier(self.raw()) })
    }

    /// Enter a barrier without blocking
    ///
    /// # Standard section(s)
    ///
    /// 5.12.1
    fn immediate_barrier<'a, Sc: Scope<'a>>(&self, scope: Sc) -> Result<UniqueRequest<'a, Sc>> {
        let mut request = unsafe { ffi::RSMPI_REQUEST_NULL };
        check_result(unsafe { ffi::MPI_Ibarrier(self.raw(), &mut request) })?;
        Ok(unsafe { UniqueRequest::from_raw(request, scope) })
    }

    /// Send `buf` to `dest` with `tag`, blocking until the buffer can be reused
    ///
    /// # Standard section(s)
    ///
    /// 3.2.1
    fn send<T: Equivalence>(&self, buf: &[T], dest: Rank, tag: Tag) -> Result<()> {
        let count = count_of("send buffer", buf.len())?;
        check_result(unsafe {
            ffi::MPI_Send(
                send_ptr(buf),
                count,
                T::equivalent_datatype().as_raw(),
                dest,
                tag,
                self.raw(),
            )
        })
    }

    /// Receive a message from `source` with `tag` into `buf`
    ///
    /// Use `std::slice::from_mut` to receive a single value.
    ///
    /// # Standard section(s)
    ///
    /// 3.2.4
    fn recv<T: Equivalence>(&self, buf: &mut [T], source: Rank, tag: Tag) -> Result<()> {
        self.recv_raw(buf, source, tag, unsafe { ffi::RSMPI_STATUS_IGNORE })
    }

    /// Receive a message from `source` with `tag` into `buf` and return its status
    ///
    /// # Standard section(s)
    ///
    /// 3.2.4
    fn recv_with_status<T: Equivalence>(
        &self,
        buf: &mut [T],
        source: Rank,
        tag: Tag,
    ) -> Result<Status> {
        let mut status = Status::default();
        self.recv_raw(buf, source, tag, status.as_raw_mut())?;
        Ok(status)
    }

    #[doc(hidden)]
    fn recv_raw<T: Equivalence>(
        &self,
        buf: &mut [T],
        source: Rank,
        tag: Tag,
        status: *mut ffi::MPI_Status,
    ) -> Result<()> {
        let count = count_of("receive buffer", buf.len())?;
        check_result(unsafe {
            ffi::MPI_Recv(
                buf.as_mut_ptr() as *mut c_void,
                count,
                T::equivalent_datatype().as_raw(),
                source,
                tag,
                self.raw(),
                status,
            )
        })
    }

    /// Start sending `buf` to `dest` with `tag`
    ///
    /// # Standard section(s)
    ///
    /// 3.7.2
    fn immediate_send<'a, Sc: Scope<'a>, T: Equivalence>(
        &self,
        scope: Sc,
        buf: &'a [T],
        dest: Rank,
        tag: Tag,
    ) -> Result<UniqueRequest<'a, Sc>> {
        let count = count_of("send buffer", buf.len())?;
        let mut request = unsafe { ffi::RSMPI_REQUEST_NULL };
        check_result(unsafe {
            ffi::MPI_Isend(
                send_ptr(buf),
                count,
                T::equivalent_datatype().as_raw(),
                dest,
                tag,
                self.raw(),
                &mut request,
            )
        })?;
        Ok(unsafe { UniqueRequest::from_raw(request, scope) })
    }

    /// Start receiving a message from `source` with `tag` into `buf`
    ///
    /// # Standard section(s)
    ///
    /// 3.7.2
    fn immediate_recv<'a, Sc: Scope<'a>, T: Equivalence>(
        &self,
        scope: Sc,
        buf: &'a mut [T],
        source: Rank,
        tag: Tag,
    ) -> Result<UniqueRequest<'a, Sc>> {
        let count = count_of("receive buffer", buf.len())?;
        let mut request = unsafe { ffi::RSMPI_REQUEST_NULL };
        check_result(unsafe {
            ffi::MPI_Irecv(
                buf.as_mut_ptr() as *mut c_void,
                count,
                T::equivalent_datatype().as_raw(),
                source,
                tag,
                self.raw(),
                &mut request,
            )
        })?;
        Ok(unsafe { UniqueRequest::from_raw(request, scope) })
    }

    /// The status of a pending message from `source` with `tag`, if there is one
    ///
    /// # Standard section(s)
    ///
    /// 3.8.1
    fn immediate_probe(&self, source: Rank, tag: Tag) -> Result<Option<Status>> {
        let mut flag: c_int = 0;
        let mut status = Status::default();
        check_result(unsafe {
            ffi::MPI_Iprobe(source, tag, self.raw(), &mut flag, status.as_raw_mut())
        })?;
        Ok(if flag != 0 { Some(status) } else { None })
    }

    /// The status of a pending message from any source with `tag`, if there is one
    fn immediate_probe_any(&self, tag: Tag) -> Result<Option<Status>> {
        self.immediate_probe(unsafe { ffi::RSMPI_ANY_SOURCE }, tag)
    }

    #[doc(hidden)]
    fn check_root(&self, root: Rank) -> Result<bool> {
        let size = self.size()?;
        if root < 0 || root >= size {
            violation(
                self.raw(),
                &format!("root {} is not a rank of a communicator of size {}", root, size),
            );
        }
        Ok(self.rank()? == root)
    }

    #[doc(hidden)]
    fn require_root(&self, root: Rank, what: &str) -> Result<()> {
        if !self.check_root(root)? {
            violation(
                self.raw(),
                &format!("{} may only be called on the root rank {}", what, root),
            );
        }
        Ok(())
    }

    #[doc(hidden)]
    fn require_len(&self, what: &str, len: usize, needed: usize) {
        if len < needed {
            violation(
                self.raw(),
                &format!("{} holds {} elements but needs {}", what, len, needed),
            );
        }
    }

    #[doc(hidden)]
    fn require_same_type(&self, what: &str, send: &DynBuffer, recv: &DynBufferMut) {
        if send.datatype() != recv.datatype() {
            violation(
                self.raw(),
                &format!("{} send and receive buffers have different datatypes", what),
            );
        }
    }

    #[doc(hidden)]
    fn size_usize(&self) -> Result<usize> {
        Ok(self.size()?.max(0) as usize)
    }

    /// Gather `send` from every process into `recv` on `root`, in rank order.
    ///
    /// `recv` is required on the root, where it must hold `send.len() * size()` elements, and
    /// ignored elsewhere.
    ///
    /// # Standard section(s)
    ///
    /// 5.5
    fn gather<T: Equivalence>(
        &self,
        root: Rank,
        send: &[T],
        recv: Option<&mut [T]>,
    ) -> Result<()> {
        let count = count_of("send buffer", send.len())?;
        let recv = if self.check_root(root)? {
            match recv {
                Some(recv) => {
                    let needed = send.len() * self.size_usize()?;
                    self.require_len("gather receive buffer", recv.len(), needed);
                    Some(recv)
                }
                None => violation(self.raw(), "gather requires a receive buffer on the root"),
            }
        } else {
            None
        };
        let datatype = T::equivalent_datatype().as_raw();
        check_result(unsafe {
            ffi::MPI_Gather(
                send_ptr(send),
                count,
                datatype,
                recv_ptr(recv),
                count,
                datatype,
                root,
                self.raw(),
            )
        })
    }

    /// The non-root half of a gather to `root`
    fn gather_into<T: Equivalence>(&self, root: Rank, send: &[T]) -> Result<()> {
        self.gather(root, send, None)
    }

    /// The root half of a gather. Aborts the communicator if the caller is not `root`.
    fn gather_into_root<T: Equivalence>(
        &self,
        root: Rank,
        send: &[T],
        recv: &mut [T],
    ) -> Result<()> {
        self.require_root(root, "gather_into_root")?;
        self.gather(root, send, Some(recv))
    }

    /// The root half of a gather, collecting into a new vector
    fn gather_vec_into_root<T: Equivalence>(&self, root: Rank, send: &[T]) -> Result<Vec<T>> {
        self.require_root(root, "gather_vec_into_root")?;
        let mut recv = filled(send, send.len() * self.size_usize()?);
        self.gather(root, send, Some(&mut recv))?;
        Ok(recv)
    }

    /// Gather dynamically typed buffers. `recv` is required on the root, where it must hold
    /// `send.len() * size()` elements.
    fn gather_dyn(&self, root: Rank, send: DynBuffer, recv: Option<DynBufferMut>) -> Result<()> {
        let send_count = send.count("send buffer")?;
        let (recv_ptr, recv_type) = if self.check_root(root)? {
            match recv {
                Some(mut recv) => {
                    self.require_same_type("gather", &send, &recv);
                    let needed = send.len() * self.size_usize()?;
                    self.require_len("gather receive buffer", recv.len(), needed);
                    (recv.as_mut_ptr(), recv.datatype().as_raw())
                }
                None => violation(self.raw(), "gather requires a receive buffer on the root"),
            }
        } else {
            (ptr::null_mut(), send.datatype().as_raw())
        };
        check_result(unsafe {
            ffi::MPI_Gather(
                send.as_ptr(),
                send_count,
                send.datatype().as_raw(),
                recv_ptr,
                send_count,
                recv_type,
                root,
                self.raw(),
            )
        })
    }

    /// Gather `send` from every process into `recv` on every process, in rank order.
    ///
    /// `recv` must hold `send.len() * size()` elements.
    ///
    /// # Standard section(s)
    ///
    /// 5.7
    fn all_gather_into<T: Equivalence>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        let count = count_of("send buffer", send.len())?;
        let needed = send.len() * self.size_usize()?;
        self.require_len("all_gather receive buffer", recv.len(), needed);
        let datatype = T::equivalent_datatype().as_raw();
        check_result(unsafe {
            ffi::MPI_Allgather(
                send_ptr(send),
                count,
                datatype,
                recv.as_mut_ptr() as *mut c_void,
                count,
                datatype,
                self.raw(),
            )
        })
    }

    /// Gather `send` from every process into a new vector on every process
    fn all_gather<T: Equivalence>(&self, send: &[T]) -> Result<Vec<T>> {
        let mut recv = filled(send, send.len() * self.size_usize()?);
        self.all_gather_into(send, &mut recv)?;
        Ok(recv)
    }

    /// Gather dynamically typed buffers on every process
    fn all_gather_dyn(&self, send: DynBuffer, mut recv: DynBufferMut) -> Result<()> {
        let count = send.count("send buffer")?;
        self.require_same_type("all_gather", &send, &recv);
        let needed = send.len() * self.size_usize()?;
        self.require_len("all_gather receive buffer", recv.len(), needed);
        check_result(unsafe {
            ffi::MPI_Allgather(
                send.as_ptr(),
                count,
                send.datatype().as_raw(),
                recv.as_mut_ptr(),
                count,
                recv.datatype().as_raw(),
                self.raw(),
            )
        })
    }

    /// Exchange one block with every process: block `i` of `send` goes to rank `i`, and block `i`
    /// of `recv` comes from rank `i`.
    ///
    /// The block length is `send.len() / size()`, which must be at least one. `recv` must hold as
    /// many elements as the blocks of `send`.
    ///
    /// # Standard section(s)
    ///
    /// 5.8
    fn all_to_all_into<T: Equivalence>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        let size = self.size_usize()?;
        self.require_len("all_to_all send buffer", send.len(), size);
        let block = send.len() / size.max(1);
        self.require_len("all_to_all receive buffer", recv.len(), block * size);
        let count = count_of("all_to_all block", block)?;
        let datatype = T::equivalent_datatype().as_raw();
        check_result(unsafe {
            ffi::MPI_Alltoall(
                send_ptr(send),
                count,
                datatype,
                recv.as_mut_ptr() as *mut c_void,
                count,
                datatype,
                self.raw(),
            )
        })
    }

    /// Exchange one block with every process, receiving into a new vector
    fn all_to_all<T: Equivalence>(&self, send: &[T]) -> Result<Vec<T>> {
        let size = self.size_usize()?;
        self.require_len("all_to_all send buffer", send.len(), size);
        let mut recv = filled(send, send.len() / size.max(1) * size);
        self.all_to_all_into(send, &mut recv)?;
        Ok(recv)
    }

    /// Exchange one block of dynamically typed data with every process.
    ///
    /// The block length is `send.len() / size()` on both sides. `recv` must have the datatype of
    /// `send` and hold at least one block per process; any elements past that are left alone.
    fn all_to_all_dyn(&self, send: DynBuffer, mut recv: DynBufferMut) -> Result<()> {
        let size = self.size_usize()?;
        self.require_same_type("all_to_all", &send, &recv);
        self.require_len("all_to_all send buffer", send.len(), size);
        let block = send.len() / size.max(1);
        self.require_len("all_to_all receive buffer", recv.len(), block * size);
        let count = count_of("all_to_all block", block)?;
        let datatype = send.datatype().as_raw();
        check_result(unsafe {
            ffi::MPI_Alltoall(
                send.as_ptr(),
                count,
                datatype,
                recv.as_mut_ptr(),
                count,
                datatype,
                self.raw(),
            )
        })
    }

    /// Combine `send` element-wise across all processes with `op` into `recv` on `root`.
    ///
    /// `recv` is required on the root, where it must hold `send.len()` elements, and ignored
    /// elsewhere.
    ///
    /// # Standard section(s)
    ///
    /// 5.9.1
    fn reduce<K, T: Operand<K>>(
        &self,
        op: Op<K>,
        root: Rank,
        send: &[T],
        recv: Option<&mut [T]>,
    ) -> Result<()> {
        let count = count_of("send buffer", send.len())?;
        let recv = if self.check_root(root)? {
            match recv {
                Some(recv) => {
                    self.require_len("reduce receive buffer", recv.len(), send.len());
                    Some(recv)
                }
                None => violation(self.raw(), "reduce requires a receive buffer on the root"),
            }
        } else {
            None
        };
        check_result(unsafe {
            ffi::MPI_Reduce(
                send_ptr(send),
                recv_ptr(recv),
                count,
                T::equivalent_datatype().as_raw(),
                op.as_raw(),
                root,
                self.raw(),
            )
        })
    }

    /// The non-root half of a reduction to `root`
    fn reduce_into<K, T: Operand<K>>(&self, op: Op<K>, root: Rank, send: &[T]) -> Result<()> {
        self.reduce(op, root, send, None)
    }

    /// The root half of a reduction. Aborts the communicator if the caller is not `root`.
    fn reduce_into_root<K, T: Operand<K>>(
        &self,
        op: Op<K>,
        root: Rank,
        send: &[T],
        recv: &mut [T],
    ) -> Result<()> {
        self.require_root(root, "reduce_into_root")?;
        self.reduce(op, root, send, Some(recv))
    }

    /// The root half of a reduction of a single value
    fn reduce_value_into_root<K, T: Operand<K>>(
        &self,
        op: Op<K>,
        root: Rank,
        value: T,
    ) -> Result<T> {
        let mut result = value;
        self.reduce_into_root(
            op,
            root,
            std::slice::from_ref(&value),
            std::slice::from_mut(&mut result),
        )?;
        Ok(result)
    }

    /// The root half of a reduction, collecting into a new vector
    fn reduce_vec_into_root<K, T: Operand<K>>(
        &self,
        op: Op<K>,
        root: Rank,
        send: &[T],
    ) -> Result<Vec<T>> {
        let mut result = send.to_vec();
        self.reduce_into_root(op, root, send, &mut result)?;
        Ok(result)
    }

    /// Combine `send` element-wise across all processes with `op` into `recv` on every process.
    ///
    /// `recv` must hold `send.len()` elements.
    ///
    /// # Standard section(s)
    ///
    /// 5.9.6
    fn all_reduce_into<K, T: Operand<K>>(
        &self,
        op: Op<K>,
        send: &[T],
        recv: &mut [T],
    ) -> Result<()> {
        let count = count_of("send buffer", send.len())?;
        self.require_len("all_reduce receive buffer", recv.len(), send.len());
        check_result(unsafe {
            ffi::MPI_Allreduce(
                send_ptr(send),
                recv.as_mut_ptr() as *mut c_void,
                count,
                T::equivalent_datatype().as_raw(),
                op.as_raw(),
                self.raw(),
            )
        })
    }

    /// Combine a single value across all processes
    fn all_reduce<K, T: Operand<K>>(&self, op: Op<K>, value: T) -> Result<T> {
        let mut result = value;
        self.all_reduce_into(
            op,
            std::slice::from_ref(&value),
            std::slice::from_mut(&mut result),
        )?;
        Ok(result)
    }

    /// Combine `send` element-wise across all processes into a new vector
    fn all_reduce_vec<K, T: Operand<K>>(&self, op: Op<K>, send: &[T]) -> Result<Vec<T>> {
        let mut result = send.to_vec();
        self.all_reduce_into(op, send, &mut result)?;
        Ok(result)
    }
}
