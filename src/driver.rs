//! The publish loop: read both clocks, advance the simulation, publish the
//! sample, wait for the next tick.

use std::time::Duration;

use log::debug;

use crate::clock::{ClockSource, MonotonicRawClock, Sample, SimulationState, SystemClock, TimeSimulator};
use crate::error::{Error, Result};
use crate::refclock::Publisher;

pub struct Driver<R = MonotonicRawClock, S = SystemClock> {
    simulator: TimeSimulator,
    state: SimulationState,
    publisher: Publisher,
    reference: R,
    system: S,
    interval: Duration,
}

impl Driver {
    /// Driver reading the raw monotonic clock as reference and the real-time
    /// clock as system time.
    pub fn new(simulator: TimeSimulator, publisher: Publisher, interval: Duration) -> Self {
        Self::with_clocks(simulator, publisher, interval, MonotonicRawClock, SystemClock)
    }
}

impl<R: ClockSource, S: ClockSource> Driver<R, S> {
    pub fn with_clocks(
        simulator: TimeSimulator,
        publisher: Publisher,
        interval: Duration,
        reference: R,
        system: S,
    ) -> Self {
        Self {
            simulator,
            state: SimulationState::new(),
            publisher,
            reference,
            system,
            interval,
        }
    }

    pub fn simulator(&self) -> &TimeSimulator {
        &self.simulator
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Runs one tick and publishes its sample.
    pub async fn step(&mut self) -> Result<Sample> {
        let system = self.system.now().map_err(Error::Clock)?;
        let reference = self.reference.now().map_err(Error::Clock)?;
        let sample = self.simulator.tick(&mut self.state, reference, system);
        self.publisher.publish(&sample).await?;
        Ok(sample)
    }

    /// Publishes a sample every interval, handing each one to `observer`.
    ///
    /// Only returns on the first error from publishing or from `observer`.
    pub async fn run<F>(&mut self, mut observer: F) -> Result<()>
    where
        F: FnMut(&TimeSimulator, &Sample) -> Result<()>,
    {
        loop {
            let sample = self.step().await?;
            observer(&self.simulator, &sample)?;
            debug!("Sleeping {:?} until next sample", self.interval);
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Console line for a sample: seconds left until the leap and the offset.
pub fn report_line(simulator: &TimeSimulator, sample: &Sample) -> String {
    format!(
        "{:6}\t{:+.9}",
        simulator.seconds_to_leap(sample.system),
        sample.offset
    )
}
