use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid target `{0}`: expected a shared memory unit number or an absolute socket path")]
    InvalidTarget(String),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{op} failed for shared memory key {key:#x}: {source}")]
    Shm {
        op: &'static str,
        key: libc::key_t,
        source: io::Error,
    },

    #[error("failed to connect to socket {}: {source}", .path.display())]
    Connect { path: PathBuf, source: io::Error },

    #[error("failed to send sample: {0}")]
    Send(#[source] io::Error),

    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("failed to read clock: {0}")]
    Clock(#[source] io::Error),

    #[error("failed to record sample: {0}")]
    Record(#[from] csv::Error),
}
