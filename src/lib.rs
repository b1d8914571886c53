//! Leap-second reference clock simulator.
//!
//! Publishes a synthetic clock that reaches a leap-second instant after a
//! configured lead time, either through the NTP SHM refclock segment or the
//! chrony SOCK refclock datagram.

pub mod clock;
pub mod driver;
pub mod error;
pub mod refclock;

pub use error::{Error, Result};
