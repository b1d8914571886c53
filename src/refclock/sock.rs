//! chrony SOCK refclock datagram.
//!
//! Each sample is one fixed-size `struct sock_sample` in native byte order,
//! sent whole over a connected Unix datagram socket. The record has no
//! framing, so anything short of a complete send is treated as fatal.

use std::mem::{offset_of, size_of};
use std::path::{Path, PathBuf};

use libc::{c_int, suseconds_t, time_t};
use log::{debug, info};
use tokio::net::UnixDatagram;

use super::leap_value;
use crate::clock::Sample;
use crate::error::{Error, Result};

/// Identifies a `sock_sample` to the receiver ("SOCK").
pub const SOCK_MAGIC: c_int = 0x534f_434b;

/// Size of one encoded datagram.
pub const SOCK_SAMPLE_LEN: usize = size_of::<SockSample>();

/// Layout of `struct sock_sample` as read by chronyd.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SockSample {
    /// System time of the measurement (`struct timeval`).
    pub tv_sec: time_t,
    pub tv_usec: suseconds_t,
    /// Offset between the reference clock and system time, in seconds.
    pub offset: f64,
    /// Non-zero if the sample is from a PPS pulse; unused here.
    pub pulse: c_int,
    pub leap: c_int,
    /// Always sent as zero.
    pub pad: c_int,
    pub magic: c_int,
}

#[cfg(all(target_os = "linux", target_pointer_width = "64"))]
const _: () = assert!(SOCK_SAMPLE_LEN == 40);

impl SockSample {
    pub fn encode(sample: &Sample) -> Self {
        Self {
            tv_sec: sample.system.seconds as time_t,
            tv_usec: sample.system.micros() as suseconds_t,
            offset: sample.offset,
            pulse: 0,
            leap: leap_value(sample.leap_pending),
            pad: 0,
            magic: SOCK_MAGIC,
        }
    }

    pub fn to_bytes(&self) -> [u8; SOCK_SAMPLE_LEN] {
        let mut buf = [0u8; SOCK_SAMPLE_LEN];
        let mut put = |offset: usize, bytes: &[u8]| {
            buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        };
        put(offset_of!(SockSample, tv_sec), &self.tv_sec.to_ne_bytes());
        put(offset_of!(SockSample, tv_usec), &self.tv_usec.to_ne_bytes());
        put(offset_of!(SockSample, offset), &self.offset.to_ne_bytes());
        put(offset_of!(SockSample, pulse), &self.pulse.to_ne_bytes());
        put(offset_of!(SockSample, leap), &self.leap.to_ne_bytes());
        put(offset_of!(SockSample, magic), &self.magic.to_ne_bytes());
        buf
    }
}

/// A send of `sent` bytes is only acceptable if it carried the whole record.
pub fn check_sent(sent: usize, expected: usize) -> Result<()> {
    if sent != expected {
        return Err(Error::ShortWrite { sent, expected });
    }
    Ok(())
}

/// Sends samples to a Unix datagram socket, typically chronyd's
/// `refclock SOCK` path.
#[derive(Debug)]
pub struct SockPublisher {
    socket: UnixDatagram,
    path: PathBuf,
}

impl SockPublisher {
    /// Creates an unbound datagram socket connected to `path`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let socket = UnixDatagram::unbound()
            .and_then(|socket| socket.connect(&path).map(|()| socket))
            .map_err(|source| Error::Connect {
                path: path.clone(),
                source,
            })?;
        info!("Connected to socket {}", path.display());
        Ok(Self { socket, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn publish(&mut self, sample: &Sample) -> Result<()> {
        let record = SockSample::encode(sample);
        let sent = self.socket.send(&record.to_bytes()).await.map_err(Error::Send)?;
        check_sent(sent, SOCK_SAMPLE_LEN)?;
        debug!(
            "SOCK sample time={}.{:06} offset={:+.9} leap={}",
            record.tv_sec, record.tv_usec, record.offset, record.leap
        );
        Ok(())
    }
}
