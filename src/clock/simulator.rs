//! Leap-second clock simulator.
//!
//! The simulated clock is the reference (monotonic) clock shifted by a whole
//! number of seconds, chosen on the first tick so that the simulated time is
//! exactly `lead_seconds` before the leap target. When the simulated time
//! reaches the target the shift is reduced by one second, which is how the
//! inserted leap second shows up to a consumer.
//!
//! | Tick                       | `leap_pending` reported | offset after tick |
//! |----------------------------|-------------------------|-------------------|
//! | before target              | true                    | initial           |
//! | first at or after target   | true                    | initial − 1       |
//! | any later tick             | false                   | initial − 1       |

use log::info;

use super::Timestamp;

/// Mutable simulation state, owned by whoever drives the ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationState {
    /// Seconds added to the reference clock; `None` until the first tick.
    accumulated_offset: Option<i64>,
    leap_pending: bool,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            accumulated_offset: None,
            leap_pending: true,
        }
    }

    pub fn accumulated_offset(&self) -> Option<i64> {
        self.accumulated_offset
    }

    pub fn leap_pending(&self) -> bool {
        self.leap_pending
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

/// One simulated clock sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Reference time plus the accumulated offset.
    pub simulated: Timestamp,
    /// Wall-clock reading taken in the same tick.
    pub system: Timestamp,
    /// Whether the leap second was still upcoming when this tick was evaluated.
    pub leap_pending: bool,
    /// `simulated - system` in seconds.
    pub offset: f64,
}

/// Largest accepted magnitude of the lead time.
pub const MAX_LEAD_SECONDS: i64 = 1 << 40;
/// Largest accepted leap target. Together with [`MAX_LEAD_SECONDS`] this keeps
/// the offset arithmetic in range for any reference reading below 2^61 s.
pub const MAX_LEAP_TARGET: i64 = 1 << 40;

/// Fixed parameters of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSimulator {
    leap_target: i64,
    lead_seconds: i64,
}

impl TimeSimulator {
    /// # Arguments
    /// * `leap_target` - Instant (seconds since the epoch) at which the leap second is inserted
    /// * `lead_seconds` - How far before `leap_target` the simulated clock reads on the first tick
    pub fn new(leap_target: i64, lead_seconds: i64) -> Self {
        debug_assert!((0..=MAX_LEAP_TARGET).contains(&leap_target));
        debug_assert!((-MAX_LEAD_SECONDS..=MAX_LEAD_SECONDS).contains(&lead_seconds));
        Self {
            leap_target,
            lead_seconds,
        }
    }

    /// Advances `state` by one tick and returns the resulting sample.
    pub fn tick(&self, state: &mut SimulationState, reference: Timestamp, system: Timestamp) -> Sample {
        let mut offset = *state
            .accumulated_offset
            .get_or_insert(self.leap_target - self.lead_seconds - reference.seconds);

        let leap_pending = state.leap_pending;
        if leap_pending && reference.seconds + offset >= self.leap_target {
            offset -= 1;
            state.accumulated_offset = Some(offset);
            state.leap_pending = false;
            info!("Inserting leap second, clock offset is now {offset}s");
        }

        let simulated = reference.add_seconds(offset);
        Sample {
            simulated,
            system,
            leap_pending,
            offset: simulated.offset_from(&system),
        }
    }

    /// Whole seconds from `system` to the leap target.
    pub fn seconds_to_leap(&self, system: Timestamp) -> i64 {
        self.leap_target - system.seconds
    }
}
