//! Error number definitions.
//!
//! The subset of `<errno.h>` this library can surface, a value type for
//! carrying host error numbers through `Result`s, and thread-local errno
//! storage for the C surface.

use std::cell::Cell;
use std::fmt;

thread_local! {
    static ERRNO: Cell<i32> = const { Cell::new(0) };
}

/// Well-known errno constants.
pub const EPERM: i32 = 1;
pub const EINTR: i32 = 4;
pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EINVAL: i32 = 22;
pub const ENOTTY: i32 = 25;
pub const ENOSPC: i32 = 28;
pub const ESPIPE: i32 = 29;
pub const EPIPE: i32 = 32;

/// A host error number captured after a failed descriptor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// The errno left behind by the most recent failed host call on this
    /// thread.
    #[must_use]
    pub fn last_os() -> Self {
        Self(std::io::Error::last_os_error().raw_os_error().unwrap_or(EIO))
    }

    /// perror-style message for this error number.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self.0 {
            EPERM => "Operation not permitted",
            EINTR => "Interrupted system call",
            EIO => "Input/output error",
            EBADF => "Bad file descriptor",
            EAGAIN => "Resource temporarily unavailable",
            ENOMEM => "Cannot allocate memory",
            EACCES => "Permission denied",
            EINVAL => "Invalid argument",
            ENOTTY => "Inappropriate ioctl for device",
            ENOSPC => "No space left on device",
            ESPIPE => "Illegal seek",
            EPIPE => "Broken pipe",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.message(), self.0)
    }
}

impl std::error::Error for Errno {}

/// Returns the current thread-local errno value.
///
/// Equivalent to reading C `errno`.
pub fn get_errno() -> i32 {
    ERRNO.get()
}

/// Sets the current thread-local errno value.
///
/// Equivalent to assigning to C `errno`.
pub fn set_errno(value: i32) {
    ERRNO.set(value);
}

/// Address of this thread's errno cell, for the `errno_location` ABI.
///
/// The pointer is valid for the lifetime of the calling thread.
pub fn errno_location() -> *mut i32 {
    ERRNO.with(Cell::as_ptr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_roundtrip() {
        set_errno(0);
        assert_eq!(get_errno(), 0);
        set_errno(EBADF);
        assert_eq!(get_errno(), EBADF);
        set_errno(0);
    }

    #[test]
    fn test_errno_location_is_stable_per_thread() {
        assert_eq!(errno_location(), errno_location());
        assert!(!errno_location().is_null());
    }

    #[test]
    fn test_message_table() {
        assert_eq!(Errno(EBADF).message(), "Bad file descriptor");
        assert_eq!(Errno(EINVAL).message(), "Invalid argument");
        assert_eq!(Errno(-1).message(), "Unknown error");
    }

    #[test]
    fn test_display_includes_number() {
        let text = Errno(EBADF).to_string();
        assert!(text.contains("Bad file descriptor"));
        assert!(text.contains('9'));
    }
}
