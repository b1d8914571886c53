use std::fs::File;

use csv::Writer;
use leapsim::clock::{Sample, TimeSimulator};
use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy)]
struct SampleRecord {
    seconds_to_leap: i64,
    offset: f64,
    leap_pending: bool,
    simulated_sec: i64,
    simulated_nsec: u32,
    system_sec: i64,
    system_nsec: u32,
}

/// CSV trace of every published sample.
pub struct SampleLog {
    writer: Writer<File>,
}

impl SampleLog {
    pub fn create(file_path: &str) -> Result<Self, csv::Error> {
        let file = File::create(file_path)?;
        Ok(SampleLog {
            writer: Writer::from_writer(file),
        })
    }

    /// Appends one row and flushes, so the trace survives the process being killed.
    pub fn record(&mut self, simulator: &TimeSimulator, sample: &Sample) -> Result<(), csv::Error> {
        let data = SampleRecord {
            seconds_to_leap: simulator.seconds_to_leap(sample.system),
            offset: sample.offset,
            leap_pending: sample.leap_pending,
            simulated_sec: sample.simulated.seconds,
            simulated_nsec: sample.simulated.nanos,
            system_sec: sample.system.seconds,
            system_nsec: sample.system.nanos,
        };
        self.writer.serialize(data)?;
        self.writer.flush()?;
        Ok(())
    }
}
