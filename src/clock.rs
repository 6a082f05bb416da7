//! The MPI wall clock
//!
//! [`MpiClock`] reads `MPI_Wtime`, a monotonic clock with double precision seconds. Its resolution
//! is `MPI_Wtick`.

use std::ops::{Add, Sub};
use std::time::Duration;

use crate::ffi;

/// Time in seconds since an arbitrary time in the past.
pub fn wtime() -> f64 {
    unsafe { ffi::RSMPI_Wtime() }
}

/// Resolution of [`wtime`] in seconds
pub fn wtick() -> f64 {
    unsafe { ffi::RSMPI_Wtick() }
}

/// A point in time read from [`MpiClock`]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Seconds since the clock's epoch
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }

    /// The time elapsed since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_secs_f64((self.0 - earlier.0).max(0.0))
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        self.duration_since(rhs)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.as_secs_f64())
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.as_secs_f64())
    }
}

/// Steady clock backed by `MPI_Wtime`
#[derive(Copy, Clone, Debug, Default)]
pub struct MpiClock;

impl MpiClock {
    /// The clock never goes backwards.
    pub const IS_STEADY: bool = true;

    /// The current time
    pub fn now() -> Timestamp {
        Timestamp(wtime())
    }

    /// The clock resolution
    pub fn tick() -> Duration {
        Duration::from_secs_f64(wtick())
    }
}
