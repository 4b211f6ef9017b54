//! C ABI boundary for ministdio.
//!
//! Exposes descriptor attachment to C callers as opaque stream handles.
//! A global handle table maps each handle to its stream; callers never
//! receive a pointer into Rust-owned data. The exported symbols are
//! intentionally namespaced (`msio_*`) until the project flips to real
//! stdio symbol exports.
//!
//! Errno discipline follows C: failing calls set the thread-local cell
//! reachable through [`msio_errno_location`] and return NULL, -1 or EOF.

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::sync::OnceLock;

use parking_lot::Mutex;

use ministdio_core::errno::{self, EBADF, EINVAL};
use ministdio_core::{Stream, flush_open_streams, open_stream_list};

/// C EOF return value.
const EOF: c_int = -1;

/// First dynamically issued handle. Low non-zero values stay reserved so
/// a handle can never be mistaken for a caller-owned heap pointer.
const FIRST_HANDLE: usize = 0x1000_0010;

struct HandleTable {
    streams: HashMap<usize, Stream>,
    next: usize,
}

impl HandleTable {
    fn new() -> Self {
        Self {
            streams: HashMap::new(),
            next: FIRST_HANDLE,
        }
    }

    fn insert(&mut self, stream: Stream) -> usize {
        let id = self.next;
        self.next = id.wrapping_add(1);
        self.streams.insert(id, stream);
        id
    }
}

fn table() -> &'static Mutex<HandleTable> {
    static TABLE: OnceLock<Mutex<HandleTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HandleTable::new()))
}

// ---------------------------------------------------------------------------
// msio_fdopen / msio_fclose
// ---------------------------------------------------------------------------

/// Attach an already-open descriptor; the `msio_` spelling of `fdopen`.
///
/// Returns an opaque stream handle, or NULL with errno set.
///
/// # Safety
///
/// `mode` must be NULL or a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn msio_fdopen(fd: c_int, mode: *const c_char) -> *mut c_void {
    if mode.is_null() {
        errno::set_errno(EINVAL);
        return std::ptr::null_mut();
    }
    // SAFETY: caller guarantees mode is a NUL-terminated C string.
    let mode_bytes = unsafe { CStr::from_ptr(mode) }.to_bytes();
    let Ok(mode_str) = std::str::from_utf8(mode_bytes) else {
        errno::set_errno(EINVAL);
        return std::ptr::null_mut();
    };

    match Stream::attach(fd, mode_str) {
        Ok(stream) => {
            let id = table().lock().insert(stream);
            id as *mut c_void
        }
        Err(err) => {
            errno::set_errno(err.to_errno());
            std::ptr::null_mut()
        }
    }
}

/// Flush and close a stream handle; the `msio_` spelling of `fclose`.
///
/// Returns 0, or EOF with errno set. The handle is dead afterwards even
/// when the flush or close reported an error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn msio_fclose(stream: *mut c_void) -> c_int {
    let id = stream as usize;
    let Some(s) = table().lock().streams.remove(&id) else {
        errno::set_errno(EBADF);
        return EOF;
    };
    match s.close() {
        Ok(()) => 0,
        Err(err) => {
            errno::set_errno(err.0);
            EOF
        }
    }
}

// ---------------------------------------------------------------------------
// msio_fflush
// ---------------------------------------------------------------------------

/// Flush one stream, or every open stream when `stream` is NULL; the
/// `msio_` spelling of `fflush`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn msio_fflush(stream: *mut c_void) -> c_int {
    if stream.is_null() {
        let failures = flush_open_streams(open_stream_list());
        return if failures == 0 { 0 } else { EOF };
    }
    let id = stream as usize;
    let table = table().lock();
    let Some(s) = table.streams.get(&id) else {
        drop(table);
        errno::set_errno(EBADF);
        return EOF;
    };
    match s.flush() {
        Ok(()) => 0,
        Err(err) => {
            errno::set_errno(err.0);
            EOF
        }
    }
}

// ---------------------------------------------------------------------------
// msio_fileno / msio_errno_location
// ---------------------------------------------------------------------------

/// Underlying descriptor of a stream handle; the `msio_` spelling of
/// `fileno`. Returns -1 with errno set for an unknown handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn msio_fileno(stream: *mut c_void) -> c_int {
    let id = stream as usize;
    let fd = table().lock().streams.get(&id).map(Stream::fd);
    match fd {
        Some(fd) => fd,
        None => {
            errno::set_errno(EBADF);
            -1
        }
    }
}

/// Thread-local errno cell for the msio surface.
#[unsafe(no_mangle)]
pub extern "C" fn msio_errno_location() -> *mut c_int {
    errno::errno_location()
}
