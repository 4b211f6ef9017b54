//! Stream operation table.
//!
//! The four capability slots behind a stream: read, write, seek, close.
//! They are selected once at construction and never rebound, so a stream's
//! kind is fixed for its lifetime. Descriptor attachment always binds
//! [`FdOps`]; other stream kinds would implement the same trait.

use std::io::SeekFrom;

use crate::errno::Errno;
use crate::sys;

/// Operations a stream performs against its descriptor.
pub trait StreamOps: Send + Sync {
    /// Read into `buf`. Returns the byte count, 0 at end of stream.
    fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize, Errno>;

    /// Write from `buf`. Returns the byte count accepted, possibly short.
    fn write(&self, fd: i32, buf: &[u8]) -> Result<usize, Errno>;

    /// Reposition the stream. Returns the new absolute offset.
    fn seek(&self, fd: i32, pos: SeekFrom) -> Result<u64, Errno>;

    /// Release the descriptor.
    fn close(&self, fd: i32) -> Result<(), Errno>;
}

/// Descriptor-backed operations: straight through to the host calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FdOps;

impl StreamOps for FdOps {
    fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
        sys::read(fd, buf)
    }

    fn write(&self, fd: i32, buf: &[u8]) -> Result<usize, Errno> {
        sys::write(fd, buf)
    }

    fn seek(&self, fd: i32, pos: SeekFrom) -> Result<u64, Errno> {
        sys::seek(fd, pos)
    }

    fn close(&self, fd: i32) -> Result<(), Errno> {
        sys::close(fd)
    }
}
