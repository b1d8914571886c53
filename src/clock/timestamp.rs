use chrono::{DateTime, Utc};

pub(crate) const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A clock reading as whole seconds plus nanoseconds.
///
/// `nanos` is always below one second; negative instants carry the sign in
/// `seconds`, the same way a `timespec` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        debug_assert!((nanos as i64) < NANOS_PER_SEC);
        Self { seconds, nanos }
    }

    pub fn micros(&self) -> u32 {
        self.nanos / 1000
    }

    /// Shift the seconds component, leaving the sub-second part untouched.
    pub fn add_seconds(self, seconds: i64) -> Self {
        Self {
            seconds: self.seconds + seconds,
            nanos: self.nanos,
        }
    }

    /// Signed difference `self - other` in seconds, nanosecond accurate.
    pub fn offset_from(&self, other: &Timestamp) -> f64 {
        (self.seconds - other.seconds) as f64
            + (self.nanos as i64 - other.nanos as i64) as f64 / NANOS_PER_SEC as f64
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self {
            seconds: time.timestamp(),
            nanos: time.timestamp_subsec_nanos().min(NANOS_PER_SEC as u32 - 1),
        }
    }
}

impl From<libc::timespec> for Timestamp {
    fn from(ts: libc::timespec) -> Self {
        Self {
            seconds: ts.tv_sec as i64,
            nanos: ts.tv_nsec as u32,
        }
    }
}
