use std::io;

use chrono::Utc;

use super::Timestamp;

/// Something that can be read as a clock.
pub trait ClockSource {
    fn now(&self) -> io::Result<Timestamp>;
}

/// The raw hardware-based monotonic clock, unaffected by NTP slewing.
///
/// Falls back to `CLOCK_MONOTONIC` where `CLOCK_MONOTONIC_RAW` is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicRawClock;

#[cfg(any(target_os = "linux", target_os = "android"))]
const MONOTONIC_CLOCK_ID: libc::clockid_t = libc::CLOCK_MONOTONIC_RAW;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MONOTONIC_CLOCK_ID: libc::clockid_t = libc::CLOCK_MONOTONIC;

impl ClockSource for MonotonicRawClock {
    fn now(&self) -> io::Result<Timestamp> {
        // SAFETY: an all-zero timespec is valid and `ts` is writable.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::clock_gettime(MONOTONIC_CLOCK_ID, &mut ts) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timestamp::from(ts))
    }
}

/// The real-time system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> io::Result<Timestamp> {
        Ok(Timestamp::from(Utc::now()))
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    fn now(&self) -> io::Result<Timestamp> {
        (**self).now()
    }
}
