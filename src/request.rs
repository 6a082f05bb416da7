//! Request objects for non-blocking operations
//!
//! Non-blocking operations such as `immediate_send()` return a [`UniqueRequest`] that borrows the
//! buffers involved in the operation. A request must be completed with `wait`, `test` or `free`
//! (or one of the batch functions of this module) before it is dropped. Dropping a pending request
//! prints a diagnostic and aborts the process, because the library would keep writing into
//! buffers that Rust considers released.
//!
//! Every request is registered with a [`Scope`] that outlives its buffers. Scopes can be created
//! with either [`scope`] or [`StaticScope`].

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::os::raw::c_int;
use std::ptr;

use conv::ConvUtil;
use smallvec::SmallVec;

use crate::error::{check_result, count_of, fatal, Error, Result};
use crate::ffi;
use crate::ffi::{MPI_Request, MPI_Status};
use crate::handle::{Deref, Handle, HandleTraits, UniqueHandle};
use crate::raw::traits::*;
use crate::status::Status;

/// Request traits
pub mod traits {
    pub use super::Scope;
}

/// Handle traits of `MPI_Request`
#[derive(Debug)]
pub enum RequestHandle {}

impl HandleTraits for RequestHandle {
    type Raw = MPI_Request;

    fn null() -> MPI_Request {
        unsafe { ffi::RSMPI_REQUEST_NULL }
    }

    fn destroy(raw: &mut MPI_Request) -> Result<()> {
        check_result(unsafe { ffi::MPI_Request_free(raw) })
    }
}

/// A reference to a request
pub type Request = Handle<RequestHandle>;

impl Request {
    /// The status of the operation if it has completed, without deallocating the request.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn status(&self) -> Result<Option<Status>> {
        let mut flag: c_int = 0;
        let mut status = Status::default();
        check_result(unsafe {
            ffi::MPI_Request_get_status(self.as_raw(), &mut flag, status.as_raw_mut())
        })?;
        Ok(if flag != 0 { Some(status) } else { None })
    }
}

const PENDING_DROP: &str = "Requests must be completed before they're dropped!";

/// The owner of a non-blocking operation registered with a `Scope` of lifetime `'a`
///
/// The `Scope` is needed to ensure that all buffers associated request will outlive the request
/// itself, even if the destructor of the request fails to run.
///
/// # Aborts
///
/// Aborts the process if dropped while the operation is still pending.
#[must_use]
pub struct UniqueRequest<'a, S: Scope<'a> = StaticScope> {
    handle: UniqueHandle<RequestHandle>,
    scope: S,
    phantom: PhantomData<Cell<&'a ()>>,
}

impl<'a, S: Scope<'a>> UniqueRequest<'a, S> {
    /// Construct a request object from the raw MPI type.
    ///
    /// # Safety
    ///
    /// - The request is null or a valid, active, non-persistent request.
    /// - All buffers associated with the request must outlive `'a`.
    pub unsafe fn from_raw(request: MPI_Request, scope: S) -> Self {
        let handle = UniqueHandle::adopt(request);
        if !handle.is_null() {
            scope.register();
        }
        UniqueRequest {
            handle,
            scope,
            phantom: PhantomData,
        }
    }

    /// Unregister the request from its scope and return the raw handle without completing it.
    ///
    /// # Safety
    ///
    /// The request may outlive its associated buffers.
    pub unsafe fn into_raw(self) -> (MPI_Request, S) {
        let mut this = ManuallyDrop::new(self);
        let request = mem::take(&mut this.handle).into_raw();
        if request != RequestHandle::null() {
            this.scope.unregister();
        }
        (request, ptr::read(&this.scope))
    }

    /// Whether the operation has completed (or was freed).
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Block until the operation has finished.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn wait(&mut self) -> Result<()> {
        self.complete(|raw| unsafe { ffi::MPI_Wait(raw, ffi::RSMPI_STATUS_IGNORE) })
    }

    /// Block until the operation has finished and return its status.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn wait_with_status(&mut self) -> Result<Status> {
        let mut status = Status::default();
        self.complete(|raw| unsafe { ffi::MPI_Wait(raw, status.as_raw_mut()) })?;
        Ok(status)
    }

    /// Whether the operation has finished. A finished request becomes null.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn test(&mut self) -> Result<bool> {
        if self.is_null() {
            return Ok(true);
        }
        let mut flag: c_int = 0;
        self.complete(|raw| unsafe { ffi::MPI_Test(raw, &mut flag, ffi::RSMPI_STATUS_IGNORE) })?;
        Ok(flag != 0)
    }

    /// The status of the operation if it has finished. A finished request becomes null.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn test_with_status(&mut self) -> Result<Option<Status>> {
        if self.is_null() {
            return Ok(Some(Status::default()));
        }
        let mut flag: c_int = 0;
        let mut status = Status::default();
        self.complete(|raw| unsafe { ffi::MPI_Test(raw, &mut flag, status.as_raw_mut()) })?;
        Ok(if flag != 0 { Some(status) } else { None })
    }

    /// Release the request without waiting. The operation still runs to completion, but its
    /// completion can no longer be observed.
    ///
    /// # Standard section(s)
    ///
    /// 3.7.3
    pub fn free(&mut self) -> Result<()> {
        self.complete(|raw| unsafe { ffi::MPI_Request_free(raw) })
    }

    /// Run a completion call on the raw handle and unregister from the scope if it completed.
    fn complete<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(*mut MPI_Request) -> c_int,
    {
        if self.is_null() {
            return Ok(());
        }
        let res = check_result(f(self.handle.as_raw_mut()));
        self.settle(true);
        res
    }

    fn settle(&mut self, was_active: bool) {
        if was_active && self.is_null() {
            unsafe { self.scope.unregister() };
        }
    }

    /// Replace the raw handle after a batch call wrote to a scratch copy.
    fn write_back(&mut self, raw: MPI_Request) {
        let was_active = !self.is_null();
        unsafe {
            *self.handle.as_raw_mut() = raw;
        }
        self.settle(was_active);
    }
}

unsafe impl<'a, S: Scope<'a>> AsRaw for UniqueRequest<'a, S> {
    type Raw = MPI_Request;
    fn as_raw(&self) -> Self::Raw {
        self.handle.as_raw()
    }
}

impl<'a, S: Scope<'a>> Deref<Request> for UniqueRequest<'a, S> {
    fn deref(&self) -> Request {
        self.handle.handle()
    }
}

impl<'a, S: Scope<'a>> Drop for UniqueRequest<'a, S> {
    fn drop(&mut self) {
        if !self.is_null() {
            fatal(PENDING_DROP);
        }
    }
}

impl<'a, S: Scope<'a>> fmt::Debug for UniqueRequest<'a, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniqueRequest")
            .field(&self.handle.as_raw())
            .finish()
    }
}

type Scratch = SmallVec<[MPI_Request; 8]>;

fn scratch<'a, S: Scope<'a>>(requests: &[UniqueRequest<'a, S>]) -> Scratch {
    requests.iter().map(|r| r.as_raw()).collect()
}

fn write_back<'a, S: Scope<'a>>(requests: &mut [UniqueRequest<'a, S>], raw: &Scratch) {
    for (request, &raw) in requests.iter_mut().zip(raw.iter()) {
        request.write_back(raw);
    }
}

fn index_of(index: c_int) -> Option<usize> {
    if index == unsafe { ffi::RSMPI_UNDEFINED } {
        None
    } else {
        index.value_as().ok()
    }
}

/// Block until one of the active `requests` completes and return its index and status.
///
/// Returns `None` if none of the requests is active.
///
/// # Standard section(s)
///
/// 3.7.5
pub fn wait_any<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
) -> Result<Option<(usize, Status)>> {
    let mut status = Status::default();
    let index = wait_any_raw(requests, status.as_raw_mut())?;
    Ok(index.map(|i| (i, status)))
}

/// Like [`wait_any`], without retrieving the status.
pub fn wait_any_without_status<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
) -> Result<Option<usize>> {
    wait_any_raw(requests, unsafe { ffi::RSMPI_STATUS_IGNORE })
}

fn wait_any_raw<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
    status: *mut MPI_Status,
) -> Result<Option<usize>> {
    let count = count_of("requests", requests.len())?;
    let mut raw = scratch(requests);
    let mut index: c_int = 0;
    let res = unsafe { ffi::MPI_Waitany(count, raw.as_mut_ptr(), &mut index, status) };
    write_back(requests, &raw);
    check_result(res)?;
    Ok(index_of(index))
}

/// Block until all `requests` have completed.
///
/// # Standard section(s)
///
/// 3.7.5
pub fn wait_all<'a, S: Scope<'a>>(requests: &mut [UniqueRequest<'a, S>]) -> Result<()> {
    wait_all_raw(requests, unsafe { ffi::RSMPI_STATUSES_IGNORE })
}

/// Block until all `requests` have completed, storing the status of `requests[i]` in
/// `statuses[i]`.
///
/// Fails with [`Error::Logic`] if `statuses` is shorter than `requests`.
pub fn wait_all_into<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
    statuses: &mut [Status],
) -> Result<()> {
    if statuses.len() < requests.len() {
        return Err(Error::Logic(
            "wait_all: fewer statuses than requests",
        ));
    }
    wait_all_raw(requests, statuses.as_mut_ptr() as *mut MPI_Status)
}

/// Block until all `requests` have completed and return their statuses in order.
pub fn wait_all_statuses<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
) -> Result<Vec<Status>> {
    let mut statuses = vec![Status::default(); requests.len()];
    wait_all_into(requests, &mut statuses)?;
    Ok(statuses)
}

fn wait_all_raw<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
    statuses: *mut MPI_Status,
) -> Result<()> {
    let count = count_of("requests", requests.len())?;
    let mut raw = scratch(requests);
    let res = unsafe { ffi::MPI_Waitall(count, raw.as_mut_ptr(), statuses) };
    write_back(requests, &raw);
    check_result(res)
}

/// Block until at least one of the active `requests` completes.
///
/// The indices of all requests completed by this call are stored at the front of `indices`, their
/// statuses at the front of `statuses` if given. Returns how many completed.
///
/// Fails with [`Error::Logic`] if `indices` or `statuses` is shorter than `requests`, or if none
/// of the requests is active.
///
/// # Standard section(s)
///
/// 3.7.5
pub fn wait_some<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
    indices: &mut [usize],
    statuses: Option<&mut [Status]>,
) -> Result<usize> {
    if indices.len() < requests.len() {
        return Err(Error::Logic("wait_some: fewer indices than requests"));
    }
    let statuses = match statuses {
        Some(statuses) if statuses.len() < requests.len() => {
            return Err(Error::Logic("wait_some: fewer statuses than requests"));
        }
        Some(statuses) => statuses.as_mut_ptr() as *mut MPI_Status,
        None => unsafe { ffi::RSMPI_STATUSES_IGNORE },
    };

    let count = count_of("requests", requests.len())?;
    let mut raw = scratch(requests);
    let mut raw_indices: SmallVec<[c_int; 8]> = SmallVec::from_elem(0, requests.len());
    let mut outcount: c_int = 0;
    let res = unsafe {
        ffi::MPI_Waitsome(
            count,
            raw.as_mut_ptr(),
            &mut outcount,
            raw_indices.as_mut_ptr(),
            statuses,
        )
    };
    write_back(requests, &raw);
    check_result(res)?;

    let completed = match index_of(outcount) {
        Some(completed) => completed,
        None => return Err(Error::Logic("wait_some: no active requests")),
    };
    for (slot, &index) in indices.iter_mut().zip(&raw_indices[..completed]) {
        *slot = index.value_as().unwrap_or(usize::MAX);
    }
    Ok(completed)
}

/// Like [`wait_some`], appending the indices of the completed requests to `indices`.
pub fn wait_some_into<'a, S: Scope<'a>>(
    requests: &mut [UniqueRequest<'a, S>],
    indices: &mut Vec<usize>,
) -> Result<usize> {
    let start = indices.len();
    indices.resize(start + requests.len(), 0);
    let result = wait_some(requests, &mut indices[start..], None);
    let completed = *result.as_ref().unwrap_or(&0);
    indices.truncate(start + completed);
    result
}

/// A common interface for [`LocalScope`] and [`StaticScope`] used internally by the `request`
/// module.
///
/// # Safety
///
/// Implementations must keep track of registrations if their lifetime is shorter than `'static`.
pub unsafe trait Scope<'a> {
    /// Registers a request with the scope.
    fn register(&self) {
        self.register_many(1)
    }

    /// Registers multiple requests with the scope.
    fn register_many(&self, count: usize);

    /// Unregisters a request from the scope.
    ///
    /// # Safety
    ///
    /// Only requests that were registered before may be unregistered.
    unsafe fn unregister(&self) {
        self.unregister_many(1)
    }

    /// Unregisters multiple requests from the scope.
    ///
    /// # Safety
    ///
    /// Only requests that were registered before may be unregistered.
    unsafe fn unregister_many(&self, count: usize);
}

/// The scope that lasts as long as the entire execution of the program
///
/// For any request registered with a `StaticScope`, its associated buffers must be `'static`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StaticScope;

unsafe impl Scope<'static> for StaticScope {
    fn register_many(&self, _count: usize) {}
    unsafe fn unregister_many(&self, _count: usize) {}
}

/// A temporary scope that lasts no more than the lifetime `'a`
///
/// To obtain a `LocalScope`, use the [`scope`] function. For any request registered with a
/// `LocalScope<'a>`, its associated buffers must outlive `'a`.
///
/// # Aborts
///
/// When a `LocalScope` ends while requests are still registered with it, the process aborts.
#[derive(Debug)]
pub struct LocalScope<'a> {
    num_requests: Cell<usize>,
    phantom: PhantomData<Cell<&'a ()>>, // Cell needed to ensure 'a is invariant
}

impl<'a> LocalScope<'a> {
    /// Number of requests currently registered
    pub fn num_requests(&self) -> usize {
        self.num_requests.get()
    }
}

impl<'a> Drop for LocalScope<'a> {
    fn drop(&mut self) {
        if self.num_requests.get() != 0 {
            fatal(PENDING_DROP);
        }
    }
}

unsafe impl<'a, 'b> Scope<'a> for &'b LocalScope<'a> {
    fn register_many(&self, count: usize) {
        self.num_requests.set(self.num_requests.get() + count)
    }

    unsafe fn unregister_many(&self, count: usize) {
        match self.num_requests.get().checked_sub(count) {
            Some(n) => self.num_requests.set(n),
            None => fatal("unregister has been called more times than register"),
        }
    }
}

/// Used to create a [`LocalScope`]
///
/// The function creates a `LocalScope` and then passes it into the given closure as an argument.
/// All buffers associated with a request must exist *outside* the scope.
///
/// ```no_run
/// # use mpi_handles::traits::*;
/// # let universe = mpi_handles::initialize().unwrap().unwrap();
/// let world = universe.world();
/// let mut received = 0i32;
/// mpi_handles::request::scope(|scope| {
///     let mut request = world.immediate_recv(scope, std::slice::from_mut(&mut received), 0, 7)?;
///     request.wait()
/// })
/// .unwrap();
/// ```
pub fn scope<'a, F, R>(f: F) -> R
where
    F: FnOnce(&LocalScope<'a>) -> R,
{
    f(&LocalScope {
        num_requests: Default::default(),
        phantom: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_requests_are_not_registered() {
        scope(|scope| {
            let request = unsafe { UniqueRequest::from_raw(RequestHandle::null(), scope) };
            assert!(request.is_null());
            assert_eq!(scope.num_requests(), 0);
        });
    }

    #[test]
    fn completing_a_null_request_is_a_no_op() {
        let mut request = unsafe { UniqueRequest::from_raw(RequestHandle::null(), StaticScope) };
        request.wait().unwrap();
        assert!(request.test().unwrap());
        request.free().unwrap();
        let (raw, _) = unsafe { request.into_raw() };
        assert_eq!(raw, RequestHandle::null());
    }

    #[test]
    fn undersized_batch_buffers_are_rejected() {
        let mut requests = vec![
            unsafe { UniqueRequest::from_raw(RequestHandle::null(), StaticScope) },
            unsafe { UniqueRequest::from_raw(RequestHandle::null(), StaticScope) },
        ];
        let mut statuses = [Status::default(); 1];
        assert!(matches!(
            wait_all_into(&mut requests, &mut statuses),
            Err(Error::Logic(_))
        ));
        let mut indices = [0usize; 1];
        assert!(matches!(
            wait_some(&mut requests, &mut indices, None),
            Err(Error::Logic(_))
        ));
    }
}
