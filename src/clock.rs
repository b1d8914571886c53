//! Simulated clock: timestamps, clock sources, configuration and the
//! leap-second state machine.

mod config;
mod simulator;
mod source;
mod timestamp;

pub use config::SimConfig;
pub use simulator::{Sample, SimulationState, TimeSimulator, MAX_LEAD_SECONDS, MAX_LEAP_TARGET};
pub use source::{ClockSource, MonotonicRawClock, SystemClock};
pub use timestamp::Timestamp;
