use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::info;

use super::shm::{ShmPublisher, ShmSegment};
use super::sock::SockPublisher;
use crate::clock::{Sample, SimConfig};
use crate::error::{Error, Result};

/// Where samples are published, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    /// NTP SHM refclock unit; the segment key is the configured base plus `unit`.
    SharedMemory { unit: u32 },
    /// Path of a Unix datagram socket (chrony SOCK refclock).
    Socket { path: PathBuf },
}

impl TransportTarget {
    /// An absolute path selects a socket, a non-negative number an SHM unit.
    pub fn parse(target: &str) -> Result<Self> {
        if target.starts_with('/') {
            return Ok(Self::Socket {
                path: PathBuf::from(target),
            });
        }
        target
            .parse::<u32>()
            .map(|unit| Self::SharedMemory { unit })
            .map_err(|_| Error::InvalidTarget(target.to_string()))
    }
}

impl FromStr for TransportTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedMemory { unit } => write!(f, "SHM unit {unit}"),
            Self::Socket { path } => write!(f, "socket {}", path.display()),
        }
    }
}

/// Publishes samples over the transport chosen at startup.
pub enum Publisher {
    SharedMemory(ShmPublisher<ShmSegment>),
    Socket(SockPublisher),
}

impl Publisher {
    /// Acquires the transport resource. Must be called from within a tokio
    /// runtime when `target` is a socket.
    pub fn open(target: &TransportTarget, config: &SimConfig) -> Result<Self> {
        let publisher = match target {
            TransportTarget::SharedMemory { unit } => {
                let segment = ShmSegment::attach(config.shm_key(*unit))?;
                Self::SharedMemory(ShmPublisher::new(segment, config.precision))
            }
            TransportTarget::Socket { path } => Self::Socket(SockPublisher::connect(path)?),
        };
        info!("Publishing samples to {target}");
        Ok(publisher)
    }

    pub async fn publish(&mut self, sample: &Sample) -> Result<()> {
        match self {
            Self::SharedMemory(shm) => {
                shm.publish(sample);
                Ok(())
            }
            Self::Socket(sock) => sock.publish(sample).await,
        }
    }
}
