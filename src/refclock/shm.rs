//! NTP SHM refclock segment.
//!
//! The segment is a single [`ShmTime`] record in SysV shared memory, read by
//! the time daemon whenever it polls the refclock. There is no lock between
//! the writer and the reader. Instead every update follows the same order:
//!
//! ```text
//! valid = 0  ->  store fields  ->  valid = 1  ->  count += 1
//! ```
//!
//! A reader in mode 1 reads `count`, reads the fields, then checks that
//! `valid` is set and `count` is unchanged. If either check fails the read
//! raced with an update and must be discarded and retried later. The writer
//! never waits for the reader and never retries.
//!
//! [`ShmSegment::snapshot`] implements that reader side, and any type that
//! implements [`SharedRecord`] can be driven by [`publish`].

use std::mem::size_of;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, Ordering};

use libc::{c_int, c_uint, key_t, time_t};
use log::{debug, info};

use super::leap_value;
use crate::clock::{Sample, Timestamp};
use crate::error::{Error, Result};

/// Mode 1: the reader must compare `count` before and after reading.
pub const SHM_MODE_CHECK_COUNT: c_int = 1;

/// Layout of the shared memory record, `struct shmTime` in ntpd and chronyd.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShmTime {
    pub mode: c_int,
    pub count: c_int,
    pub clock_sec: time_t,
    pub clock_usec: c_int,
    pub receive_sec: time_t,
    pub receive_usec: c_int,
    pub leap: c_int,
    pub precision: c_int,
    pub nsamples: c_int,
    pub valid: c_int,
    pub clock_nsec: c_uint,
    pub receive_nsec: c_uint,
    pub dummy: [c_int; 8],
}

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
const _: () = assert!(size_of::<ShmTime>() == 96);

impl ShmTime {
    /// The payload fields as last stored.
    pub fn fields(&self) -> ShmFields {
        ShmFields {
            mode: self.mode,
            clock: Timestamp {
                seconds: self.clock_sec as i64,
                nanos: self.clock_nsec,
            },
            receive: Timestamp {
                seconds: self.receive_sec as i64,
                nanos: self.receive_nsec,
            },
            leap: self.leap,
            precision: self.precision,
        }
    }
}

/// Everything written between clearing and setting `valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmFields {
    pub mode: c_int,
    /// Time of the simulated reference clock.
    pub clock: Timestamp,
    /// System time at which `clock` was read.
    pub receive: Timestamp,
    pub leap: c_int,
    pub precision: c_int,
}

impl ShmFields {
    pub fn encode(sample: &Sample, precision: c_int) -> Self {
        Self {
            mode: SHM_MODE_CHECK_COUNT,
            clock: sample.simulated,
            receive: sample.system,
            leap: leap_value(sample.leap_pending),
            precision,
        }
    }
}

/// A record that can be updated with the SHM publish protocol.
///
/// Implementations must make each call visible to a concurrent reader
/// only after everything done by the previous calls.
pub trait SharedRecord {
    fn set_valid(&mut self, valid: bool);
    fn store_fields(&mut self, fields: &ShmFields);
    fn increment_count(&mut self);
}

/// Publishes `fields` into `record` in the order a lock-free reader relies on.
pub fn publish<R: SharedRecord + ?Sized>(record: &mut R, fields: &ShmFields) {
    record.set_valid(false);
    record.store_fields(fields);
    record.set_valid(true);
    record.increment_count();
}

impl SharedRecord for ShmTime {
    fn set_valid(&mut self, valid: bool) {
        self.valid = valid as c_int;
    }

    fn store_fields(&mut self, fields: &ShmFields) {
        self.mode = fields.mode;
        self.clock_sec = fields.clock.seconds as time_t;
        self.clock_usec = fields.clock.micros() as c_int;
        self.clock_nsec = fields.clock.nanos;
        self.receive_sec = fields.receive.seconds as time_t;
        self.receive_usec = fields.receive.micros() as c_int;
        self.receive_nsec = fields.receive.nanos;
        self.leap = fields.leap;
        self.precision = fields.precision;
    }

    fn increment_count(&mut self) {
        self.count = self.count.wrapping_add(1);
    }
}

macro_rules! shm_write {
    ($segment:expr, $field:ident, $value:expr) => {
        // SAFETY: the pointer is a live attachment of at least
        // size_of::<ShmTime>() bytes for the lifetime of the segment.
        unsafe { ptr::addr_of_mut!((*$segment.ptr.as_ptr()).$field).write_volatile($value) }
    };
}

macro_rules! shm_read {
    ($segment:expr, $field:ident) => {
        // SAFETY: see shm_write.
        unsafe { ptr::addr_of!((*$segment.ptr.as_ptr()).$field).read_volatile() }
    };
}

/// An attached SysV shared memory segment holding one [`ShmTime`].
///
/// Detached on drop. Segments made by [`ShmSegment::create_private`] are
/// also marked for removal.
pub struct ShmSegment {
    ptr: NonNull<ShmTime>,
    id: c_int,
    remove_on_drop: bool,
}

// The segment is only ever written through `&mut self`.
unsafe impl Send for ShmSegment {}

impl ShmSegment {
    /// Attaches to the existing segment with `key`, normally created by the
    /// time daemon when its SHM refclock is configured.
    pub fn attach(key: key_t) -> Result<Self> {
        // SAFETY: plain syscall, no pointers involved.
        let id = unsafe { libc::shmget(key, size_of::<ShmTime>(), 0) };
        if id == -1 {
            return Err(Error::Shm {
                op: "shmget",
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        let segment = Self::map(id, key, false)?;
        info!("Attached to shared memory segment {key:#x} (id {id})");
        Ok(segment)
    }

    /// Creates and attaches a new zeroed segment not reachable by key.
    pub fn create_private() -> Result<Self> {
        let key = libc::IPC_PRIVATE;
        // SAFETY: plain syscall, no pointers involved.
        let id = unsafe { libc::shmget(key, size_of::<ShmTime>(), libc::IPC_CREAT | 0o600) };
        if id == -1 {
            return Err(Error::Shm {
                op: "shmget",
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        Self::map(id, key, true).inspect_err(|_| {
            // SAFETY: `id` was just returned by shmget.
            unsafe { libc::shmctl(id, libc::IPC_RMID, ptr::null_mut()) };
        })
    }

    fn map(id: c_int, key: key_t, remove_on_drop: bool) -> Result<Self> {
        // SAFETY: a null address lets the kernel choose where to attach.
        let addr = unsafe { libc::shmat(id, ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(Error::Shm {
                op: "shmat",
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        let ptr = NonNull::new(addr.cast::<ShmTime>()).ok_or_else(|| Error::Shm {
            op: "shmat",
            key,
            source: std::io::Error::other("null attach address"),
        })?;
        Ok(Self {
            ptr,
            id,
            remove_on_drop,
        })
    }

    /// Reads the record the way a mode 1 reader does.
    ///
    /// Returns `None` if the record is not valid or an update was in progress;
    /// the caller should try again on its next poll.
    pub fn snapshot(&self) -> Option<ShmFields> {
        let count = shm_read!(self, count);
        fence(Ordering::Acquire);
        // SAFETY: see shm_write.
        let record = unsafe { ptr::read_volatile(self.ptr.as_ptr()) };
        fence(Ordering::Acquire);
        if record.valid == 0 || shm_read!(self, count) != count {
            return None;
        }
        Some(record.fields())
    }

    /// Raw `(valid, count)` pair as currently visible.
    pub fn version(&self) -> (c_int, c_int) {
        (shm_read!(self, valid), shm_read!(self, count))
    }
}

impl SharedRecord for ShmSegment {
    fn set_valid(&mut self, valid: bool) {
        if valid {
            fence(Ordering::Release);
            shm_write!(self, valid, 1);
        } else {
            shm_write!(self, valid, 0);
            fence(Ordering::Release);
        }
    }

    fn store_fields(&mut self, fields: &ShmFields) {
        shm_write!(self, mode, fields.mode);
        shm_write!(self, clock_sec, fields.clock.seconds as time_t);
        shm_write!(self, clock_usec, fields.clock.micros() as c_int);
        shm_write!(self, clock_nsec, fields.clock.nanos);
        shm_write!(self, receive_sec, fields.receive.seconds as time_t);
        shm_write!(self, receive_usec, fields.receive.micros() as c_int);
        shm_write!(self, receive_nsec, fields.receive.nanos);
        shm_write!(self, leap, fields.leap);
        shm_write!(self, precision, fields.precision);
    }

    fn increment_count(&mut self) {
        fence(Ordering::Release);
        let count = shm_read!(self, count);
        shm_write!(self, count, count.wrapping_add(1));
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from shmat and is detached exactly once.
        unsafe {
            libc::shmdt(self.ptr.as_ptr().cast());
            if self.remove_on_drop {
                libc::shmctl(self.id, libc::IPC_RMID, ptr::null_mut());
            }
        }
    }
}

/// Publishes samples into a [`SharedRecord`], a mapped segment by default.
pub struct ShmPublisher<R = ShmSegment> {
    record: R,
    precision: c_int,
}

impl<R: SharedRecord> ShmPublisher<R> {
    pub fn new(record: R, precision: c_int) -> Self {
        Self { record, precision }
    }

    pub fn publish(&mut self, sample: &Sample) {
        let fields = ShmFields::encode(sample, self.precision);
        publish(&mut self.record, &fields);
        debug!(
            "SHM sample clock={}.{:09} receive={}.{:09} leap={}",
            fields.clock.seconds, fields.clock.nanos, fields.receive.seconds, fields.receive.nanos, fields.leap
        );
    }

    pub fn record(&self) -> &R {
        &self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    fn field_offsets_match_shm_time() {
        assert_eq!(std::mem::offset_of!(ShmTime, count), 4);
        assert_eq!(std::mem::offset_of!(ShmTime, clock_sec), 8);
        assert_eq!(std::mem::offset_of!(ShmTime, receive_sec), 24);
        assert_eq!(std::mem::offset_of!(ShmTime, leap), 36);
        assert_eq!(std::mem::offset_of!(ShmTime, valid), 48);
        assert_eq!(std::mem::offset_of!(ShmTime, clock_nsec), 52);
        assert_eq!(std::mem::offset_of!(ShmTime, dummy), 60);
    }

    #[test]
    fn fields_accept_out_of_range_nanos_from_reader_side() {
        let record = ShmTime {
            clock_nsec: 2_000_000_000,
            receive_nsec: c_uint::MAX,
            ..Default::default()
        };
        let fields = record.fields();
        assert_eq!(fields.clock.nanos, 2_000_000_000);
        assert_eq!(fields.receive.nanos, c_uint::MAX);
    }

    #[test]
    fn plain_record_keeps_nsamples_and_padding() {
        let mut record = ShmTime {
            nsamples: 3,
            ..Default::default()
        };
        let fields = ShmFields {
            mode: SHM_MODE_CHECK_COUNT,
            clock: Timestamp::new(10, 1_500),
            receive: Timestamp::new(11, 2_500),
            leap: 1,
            precision: -30,
        };
        publish(&mut record, &fields);
        assert_eq!(record.nsamples, 3);
        assert_eq!(record.dummy, [0; 8]);
        assert_eq!(record.clock_usec, 1);
        assert_eq!(record.receive_usec, 2);
        assert_eq!(record.fields(), fields);
    }
}
