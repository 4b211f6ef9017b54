//! Live-descriptor fixtures for conformance checks.
//!
//! Everything here stays inside safe Rust: descriptors come from
//! `std::fs` opens and are released through the core's close wrapper.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::os::fd::IntoRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use ministdio_core::sys;

/// Descriptor number no default Linux process table reaches; probes
/// against it fail without racing descriptor reuse.
pub const STALE_FD: i32 = 999_999_999;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("fixture setup failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no pty device available")]
    PtyUnavailable,
}

/// Closes a raw descriptor on drop unless ownership moved elsewhere.
#[derive(Debug)]
pub struct RawFdGuard {
    fd: i32,
    armed: bool,
}

impl RawFdGuard {
    #[must_use]
    pub fn new(fd: i32) -> Self {
        Self { fd, armed: true }
    }

    #[must_use]
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// Call once a stream owns the descriptor; its close handles it.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RawFdGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = sys::close(self.fd);
        }
    }
}

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

fn scratch_path(prefix: &str) -> PathBuf {
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "ministdio-harness-{prefix}-{}-{seq}.bin",
        std::process::id()
    ))
}

/// A temp file plus an open read-write descriptor on it. The file is
/// removed and the descriptor closed (unless transferred) when the
/// fixture drops.
#[derive(Debug)]
pub struct ScratchFile {
    guard: RawFdGuard,
    path: PathBuf,
}

impl ScratchFile {
    pub fn create(prefix: &str) -> Result<Self, FixtureError> {
        Self::create_with(prefix, b"")
    }

    /// Create with initial content; the descriptor is rewound to
    /// offset 0.
    pub fn create_with(prefix: &str, content: &[u8]) -> Result<Self, FixtureError> {
        let path = scratch_path(prefix);
        let mut file = fs::File::options()
            .create_new(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.write_all(content)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            guard: RawFdGuard::new(file.into_raw_fd()),
            path,
        })
    }

    #[must_use]
    pub fn fd(&self) -> i32 {
        self.guard.fd()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Call once a stream owns the descriptor.
    pub fn disarm(&mut self) {
        self.guard.disarm();
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Master side of a fresh pty, the one fixture that depends on device
/// availability. Reported distinctly so checks can skip rather than
/// fail where the environment has no pty device.
pub fn pty_master() -> Result<RawFdGuard, FixtureError> {
    let file = fs::File::options()
        .read(true)
        .write(true)
        .open("/dev/ptmx")
        .map_err(|_| FixtureError::PtyUnavailable)?;
    Ok(RawFdGuard::new(file.into_raw_fd()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_file_round_trip() {
        let scratch =
            ScratchFile::create_with("fixtures-roundtrip", b"seed").expect("scratch file");
        let mut buf = [0u8; 4];
        let got = sys::read(scratch.fd(), &mut buf).expect("descriptor reads");
        assert_eq!(&buf[..got], b"seed");
        let on_disk = fs::read(scratch.path()).expect("path readable");
        assert_eq!(on_disk, b"seed");
    }

    #[test]
    fn test_scratch_file_removes_path_on_drop() {
        let path = {
            let scratch = ScratchFile::create("fixtures-cleanup").expect("scratch file");
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_paths_never_collide() {
        let a = ScratchFile::create("fixtures-collide").expect("scratch file");
        let b = ScratchFile::create("fixtures-collide").expect("scratch file");
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_stale_fd_probe_fails() {
        assert!(sys::descriptor_status_flags(STALE_FD).is_err());
    }

    #[test]
    fn test_pty_master_is_a_terminal_when_present() {
        match pty_master() {
            Ok(master) => assert!(sys::is_terminal(master.fd())),
            Err(FixtureError::PtyUnavailable) => {}
            Err(err) => panic!("unexpected fixture error: {err}"),
        }
    }
}
