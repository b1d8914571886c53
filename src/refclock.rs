//! Reference clock records and the transports that publish them.
//!
//! Two refclock interfaces understood by NTP daemons are supported:
//!
//! - [`shm`]: the SysV shared memory segment read by ntpd's and chronyd's
//!   `SHM` refclock driver.
//! - [`sock`]: the datagram read from a Unix socket by chronyd's `SOCK`
//!   refclock driver.
//!
//! [`Publisher`] picks one of them at startup from a [`TransportTarget`].

pub mod publisher;
pub mod shm;
pub mod sock;

pub use publisher::{Publisher, TransportTarget};
pub use shm::{SharedRecord, ShmFields, ShmPublisher, ShmSegment, ShmTime};
pub use sock::{SockPublisher, SockSample, SOCK_MAGIC, SOCK_SAMPLE_LEN};

/// Leap field value when no leap second is announced.
pub const LEAP_NONE: libc::c_int = 0;
/// Leap field value announcing an inserted second at the end of the day.
pub const LEAP_INSERT: libc::c_int = 1;

pub(crate) fn leap_value(leap_pending: bool) -> libc::c_int {
    if leap_pending {
        LEAP_INSERT
    } else {
        LEAP_NONE
    }
}
