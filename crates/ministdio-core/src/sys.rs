//! Host descriptor primitives.
//!
//! Typed wrappers for the handful of host calls the attacher and the
//! descriptor-backed operations need. Each wrapper returns `Result<_, Errno>`
//! with the errno captured immediately after a failed call.
//!
//! This library layers on top of the host libc rather than replacing it, so
//! the wrappers go through `libc` instead of raw syscalls. This is the only
//! module in the crate permitted to contain `unsafe` code.

use std::io::SeekFrom;

use crate::errno::Errno;

/// Append status flag, as reported by [`descriptor_status_flags`].
pub const O_APPEND: i32 = libc::O_APPEND;

/// `fcntl(fd, F_GETFL)`: query a descriptor's status flags.
///
/// Doubles as the descriptor validity probe: a closed or never-opened fd
/// reports `EBADF` here.
#[inline]
#[allow(unsafe_code)]
pub fn descriptor_status_flags(fd: i32) -> Result<i32, Errno> {
    // SAFETY: F_GETFL reads kernel state only; any fd value is allowed.
    let rc = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(rc) }
}

/// `fcntl(fd, F_SETFL, flags)`: replace a descriptor's status flags.
#[inline]
#[allow(unsafe_code)]
pub fn set_descriptor_status_flags(fd: i32, flags: i32) -> Result<(), Errno> {
    // SAFETY: F_SETFL takes an integer argument; no pointers involved.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(()) }
}

/// `fcntl(fd, F_SETFD, FD_CLOEXEC)`: mark a descriptor close-on-exec.
#[inline]
#[allow(unsafe_code)]
pub fn set_close_on_exec(fd: i32) -> Result<(), Errno> {
    // SAFETY: F_SETFD takes an integer argument; no pointers involved.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(()) }
}

/// `fcntl(fd, F_SETFD, 0)`: clear the close-on-exec descriptor flag.
///
/// Rust's standard library opens descriptors close-on-exec, so fixtures
/// that need the flag clear start here.
#[inline]
#[allow(unsafe_code)]
pub fn clear_close_on_exec(fd: i32) -> Result<(), Errno> {
    // SAFETY: F_SETFD takes an integer argument; no pointers involved.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, 0) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(()) }
}

/// `fcntl(fd, F_GETFD)`: whether a descriptor is marked close-on-exec.
#[inline]
#[allow(unsafe_code)]
pub fn close_on_exec(fd: i32) -> Result<bool, Errno> {
    // SAFETY: F_GETFD reads kernel state only.
    let rc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if rc < 0 {
        Err(Errno::last_os())
    } else {
        Ok(rc & libc::FD_CLOEXEC != 0)
    }
}

/// Whether the descriptor refers to a terminal device.
///
/// Probed with `ioctl(TIOCGWINSZ)`: only a tty answers the window-size
/// query. Any failure (ENOTTY, EBADF, ...) reads as "not a terminal",
/// which is all the buffering decision needs.
#[must_use]
#[allow(unsafe_code)]
pub fn is_terminal(fd: i32) -> bool {
    // SAFETY: zeroed winsize is a valid ioctl output buffer.
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    // SAFETY: TIOCGWINSZ writes only into the winsize struct we own.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };
    rc == 0
}

/// `read(2)` into `buf`. Returns the byte count, 0 at end of stream.
#[inline]
#[allow(unsafe_code)]
pub fn read(fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
    // SAFETY: buf is a live mutable slice; len bounds the kernel write.
    let rc = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(rc as usize) }
}

/// `write(2)` from `buf`. Returns the byte count accepted, possibly short.
#[inline]
#[allow(unsafe_code)]
pub fn write(fd: i32, buf: &[u8]) -> Result<usize, Errno> {
    // SAFETY: buf is a live slice; len bounds the kernel read.
    let rc = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(rc as usize) }
}

/// `lseek(2)`. Returns the new absolute offset.
#[inline]
#[allow(unsafe_code)]
pub fn seek(fd: i32, pos: SeekFrom) -> Result<u64, Errno> {
    let (offset, whence) = match pos {
        SeekFrom::Start(n) => (n as i64, libc::SEEK_SET),
        SeekFrom::Current(n) => (n, libc::SEEK_CUR),
        SeekFrom::End(n) => (n, libc::SEEK_END),
    };
    // SAFETY: lseek takes integer arguments; any fd value is allowed.
    let rc = unsafe { libc::lseek(fd, offset, whence) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(rc as u64) }
}

/// `close(2)`.
#[inline]
#[allow(unsafe_code)]
pub fn close(fd: i32) -> Result<(), Errno> {
    // SAFETY: close is safe on any fd value; a bad fd reports EBADF.
    let rc = unsafe { libc::close(fd) };
    if rc < 0 { Err(Errno::last_os()) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use std::os::fd::{AsRawFd, IntoRawFd};

    use super::*;
    use crate::errno::EBADF;

    #[test]
    fn test_status_flags_on_open_file() {
        let file = std::fs::File::open("/dev/null").expect("open /dev/null");
        let flags = descriptor_status_flags(file.as_raw_fd()).expect("F_GETFL");
        assert_eq!(flags & libc::O_ACCMODE, libc::O_RDONLY);
    }

    #[test]
    fn test_status_flags_on_bad_fd() {
        let err = descriptor_status_flags(-1).unwrap_err();
        assert_eq!(err, Errno(EBADF));
    }

    #[test]
    fn test_append_flag_roundtrip() {
        let path = std::env::temp_dir().join(format!("ministdio-sys-{}.tmp", std::process::id()));
        let file = std::fs::File::create(&path).expect("create temp file");
        let fd = file.as_raw_fd();
        let flags = descriptor_status_flags(fd).expect("F_GETFL");
        assert_eq!(flags & O_APPEND, 0);
        set_descriptor_status_flags(fd, flags | O_APPEND).expect("F_SETFL");
        let flags = descriptor_status_flags(fd).expect("F_GETFL after set");
        assert_ne!(flags & O_APPEND, 0);
        drop(file);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_close_on_exec_set_clear_query() {
        let file = std::fs::File::open("/dev/null").expect("open /dev/null");
        let fd = file.into_raw_fd();
        // std opens descriptors close-on-exec already.
        assert_eq!(close_on_exec(fd), Ok(true));
        clear_close_on_exec(fd).expect("F_SETFD clear");
        assert_eq!(close_on_exec(fd), Ok(false));
        set_close_on_exec(fd).expect("F_SETFD set");
        assert_eq!(close_on_exec(fd), Ok(true));
        close(fd).expect("close");
    }

    #[test]
    fn test_regular_file_is_not_terminal() {
        let file = std::fs::File::open("/dev/null").expect("open /dev/null");
        assert!(!is_terminal(file.as_raw_fd()));
    }

    #[test]
    fn test_bad_fd_is_not_terminal() {
        assert!(!is_terminal(-1));
    }

    #[test]
    fn test_write_read_seek_roundtrip() {
        let path = std::env::temp_dir().join(format!("ministdio-rw-{}.tmp", std::process::id()));
        let file = std::fs::File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .expect("open temp file");
        let fd = file.as_raw_fd();

        assert_eq!(write(fd, b"abc"), Ok(3));
        assert_eq!(seek(fd, SeekFrom::Start(0)), Ok(0));
        let mut buf = [0u8; 8];
        assert_eq!(read(fd, &mut buf), Ok(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(read(fd, &mut buf), Ok(0));

        drop(file);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_seek_bad_fd() {
        assert_eq!(seek(-1, SeekFrom::Current(0)), Err(Errno(EBADF)));
    }

    #[test]
    fn test_close_bad_fd() {
        assert_eq!(close(-1), Err(Errno(EBADF)));
    }
}
