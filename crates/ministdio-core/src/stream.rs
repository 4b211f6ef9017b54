//! Stream objects and the descriptor attacher.
//!
//! Reference: POSIX.1-2024 fdopen, fflush, fclose.
//!
//! Design: [`Stream::attach`] is the construction path. It reconciles the
//! caller's mode string with the descriptor's kernel flags, allocates the
//! stream's single buffer block, picks line buffering for writable
//! terminals, binds descriptor-backed operations, and publishes the stream
//! in an open-stream list. Failure at any step leaves no observable trace:
//! nothing is registered and the descriptor still belongs to the caller.
//!
//! A successful attach transfers descriptor ownership to the stream. State
//! shared with registry scans sits behind a per-stream mutex; the handle
//! itself is therefore usable through `&self`.

use std::collections::TryReserveError;
use std::fmt;
use std::io::SeekFrom;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;

use crate::buffer::{BUFSIZ, BufferPolicy, LINE_TERMINATOR, StreamBuf};
use crate::config::CloexecPolicy;
use crate::errno::{EBADF, EIO, Errno};
use crate::mode::StreamMode;
use crate::ops::{FdOps, StreamOps};
use crate::registry::{OpenStreamList, open_stream_list};
use crate::sys;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an attachment failed.
#[derive(Debug, Error)]
pub enum AttachError {
    /// The mode string's first character was not `r`, `w` or `a`.
    #[error("invalid mode string")]
    InvalidMode,
    /// The descriptor's status-flag query failed; the fd is closed or
    /// never was open.
    #[error("descriptor flag query failed: {0}")]
    BadDescriptor(#[source] Errno),
    /// The buffer block could not be allocated.
    #[error("stream buffer allocation failed: {0}")]
    BufferAlloc(#[from] TryReserveError),
    /// Close-on-exec was requested and refused, under
    /// [`CloexecPolicy::Strict`] only.
    #[error("close-on-exec request refused: {0}")]
    CloexecRejected(#[source] Errno),
}

impl AttachError {
    /// The errno a C caller would observe for this failure.
    #[must_use]
    pub fn to_errno(&self) -> i32 {
        match self {
            Self::InvalidMode => crate::errno::EINVAL,
            Self::BadDescriptor(err) | Self::CloexecRejected(err) => err.0,
            Self::BufferAlloc(_) => crate::errno::ENOMEM,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Mutable stream state, guarded by the per-stream lock.
#[derive(Debug)]
struct StreamState {
    buf: StreamBuf,
    policy: BufferPolicy,
    /// Once set, the buffering policy is frozen.
    io_started: bool,
    /// Sticky end-of-stream indicator.
    eof: bool,
    /// Sticky error indicator.
    error: bool,
    /// The descriptor has been released; further I/O reports EBADF.
    closed: bool,
}

/// The part of a stream reachable from both the owning handle and
/// open-list scans.
pub(crate) struct StreamShared {
    fd: i32,
    mode: StreamMode,
    ops: Box<dyn StreamOps>,
    /// Weak edge back to the list this stream is published in.
    registry: Weak<OpenStreamList>,
    state: Mutex<StreamState>,
}

impl StreamShared {
    /// Flush pending writes. Used by exit-time sweeps; closed streams
    /// report success since they have nothing pending.
    pub(crate) fn flush_locked(&self) -> Result<(), Errno> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        self.flush_pending(&mut state)
    }

    /// Flush then release the descriptor. Idempotent.
    fn close_descriptor(&self) -> Result<(), Errno> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        let flushed = self.flush_pending(&mut state);
        state.closed = true;
        drop(state);
        let closed = self.ops.close(self.fd);
        flushed.and(closed)
    }

    fn flush_pending(&self, state: &mut StreamState) -> Result<(), Errno> {
        if state.buf.pending_write().is_empty() {
            return Ok(());
        }
        match self.write_through(state.buf.pending_write()) {
            Ok(()) => {
                state.buf.mark_flushed();
                Ok(())
            }
            Err(err) => {
                state.error = true;
                Err(err)
            }
        }
    }

    /// Push every byte of `data` to the descriptor, looping over short
    /// writes. A zero-length completion is reported as EIO rather than
    /// spinning.
    fn write_through(&self, data: &[u8]) -> Result<(), Errno> {
        let mut rest = data;
        while !rest.is_empty() {
            let n = self.ops.write(self.fd, rest)?;
            if n == 0 {
                return Err(Errno(EIO));
            }
            rest = &rest[n..];
        }
        Ok(())
    }

    fn write_bytes(&self, data: &[u8]) -> Result<usize, Errno> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Errno(EBADF));
        }
        if !self.mode.writable {
            state.error = true;
            return Err(Errno(EBADF));
        }
        state.io_started = true;
        if data.is_empty() {
            return Ok(0);
        }
        // Direction switch: buffered read-ahead and pushback do not
        // survive a write.
        if state.buf.readable() > 0 {
            state.buf.discard_read();
        }
        match state.policy {
            BufferPolicy::Unbuffered => {
                self.flush_pending(&mut state)?;
                if let Err(err) = self.write_through(data) {
                    state.error = true;
                    return Err(err);
                }
            }
            BufferPolicy::Line(terminator) => {
                match data.iter().rposition(|&b| b == terminator) {
                    Some(i) => {
                        // Everything through the last terminator reaches
                        // the descriptor now; the tail stays buffered.
                        self.flush_pending(&mut state)?;
                        if let Err(err) = self.write_through(&data[..=i]) {
                            state.error = true;
                            return Err(err);
                        }
                        self.buffer_or_write(&data[i + 1..], &mut state)?;
                    }
                    None => self.buffer_or_write(data, &mut state)?,
                }
            }
            BufferPolicy::Full => self.buffer_or_write(data, &mut state)?,
        }
        Ok(data.len())
    }

    /// Buffer `data`, flushing first when it does not fit. Data at least
    /// one whole buffer long goes straight through instead.
    fn buffer_or_write(&self, data: &[u8], state: &mut StreamState) -> Result<(), Errno> {
        if data.is_empty() {
            return Ok(());
        }
        if data.len() <= state.buf.write_space() {
            state.buf.push_write(data);
            return Ok(());
        }
        self.flush_pending(state)?;
        if data.len() >= BUFSIZ {
            if let Err(err) = self.write_through(data) {
                state.error = true;
                return Err(err);
            }
            return Ok(());
        }
        state.buf.push_write(data);
        Ok(())
    }

    fn read_bytes(&self, out: &mut [u8]) -> Result<usize, Errno> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Errno(EBADF));
        }
        if !self.mode.readable {
            state.error = true;
            return Err(Errno(EBADF));
        }
        state.io_started = true;
        if out.is_empty() {
            return Ok(0);
        }
        // Direction switch: pending writes reach the descriptor before
        // the read observes it.
        self.flush_pending(&mut state)?;

        let buffered = state.buf.take_read(out);
        if buffered > 0 {
            return Ok(buffered);
        }
        if state.eof {
            return Ok(0);
        }
        // Requests of a whole buffer or more bypass the buffer.
        if out.len() >= BUFSIZ {
            return match self.ops.read(self.fd, out) {
                Ok(0) => {
                    state.eof = true;
                    Ok(0)
                }
                Ok(n) => Ok(n),
                Err(err) => {
                    state.error = true;
                    Err(err)
                }
            };
        }
        let filled = match self.ops.read(self.fd, state.buf.fill_area()) {
            Ok(n) => n,
            Err(err) => {
                state.error = true;
                return Err(err);
            }
        };
        if filled == 0 {
            state.eof = true;
            return Ok(0);
        }
        state.buf.commit_fill(filled);
        Ok(state.buf.take_read(out))
    }

    fn unread_byte(&self, byte: u8) -> bool {
        let mut state = self.state.lock();
        if state.closed || !self.mode.readable {
            return false;
        }
        state.io_started = true;
        if state.buf.unread(byte) {
            // Pushback makes a byte readable again.
            state.eof = false;
            true
        } else {
            false
        }
    }

    fn seek_to(&self, pos: SeekFrom) -> Result<u64, Errno> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Errno(EBADF));
        }
        self.flush_pending(&mut state)?;
        state.buf.discard_read();
        state.eof = false;
        self.ops.seek(self.fd, pos)
    }
}

impl fmt::Debug for StreamShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamShared")
            .field("fd", &self.fd)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Stream handle
// ---------------------------------------------------------------------------

/// An attached, buffered descriptor stream.
///
/// The handle exclusively owns the descriptor. Dropping it flushes and
/// closes best-effort; use [`Stream::close`] to observe the result.
///
/// ```
/// use std::os::fd::IntoRawFd;
/// use ministdio_core::Stream;
///
/// let fd = std::fs::File::options()
///     .write(true)
///     .open("/dev/null")
///     .unwrap()
///     .into_raw_fd();
/// let stream = Stream::attach(fd, "w").unwrap();
/// assert!(stream.mode().writable);
/// stream.close().unwrap();
/// ```
pub struct Stream {
    shared: Arc<StreamShared>,
}

impl Stream {
    /// Attach an already-open descriptor, publishing into the process-wide
    /// open list under the environment-selected close-on-exec policy.
    pub fn attach(fd: i32, mode: &str) -> Result<Self, AttachError> {
        Self::attach_with(open_stream_list(), fd, mode, CloexecPolicy::from_env())
    }

    /// Attach with an explicit open list and close-on-exec policy.
    ///
    /// The list is linked weakly in both directions: it never owns the
    /// stream, and the stream survives the list being dropped.
    pub fn attach_with(
        list: &Arc<OpenStreamList>,
        fd: i32,
        mode: &str,
        cloexec: CloexecPolicy,
    ) -> Result<Self, AttachError> {
        // Mode validation happens before the descriptor is touched.
        let mode = StreamMode::parse(mode).ok_or(AttachError::InvalidMode)?;

        // Status-flag query doubles as the validity probe: a dead fd
        // fails here, before any allocation.
        let fd_flags = sys::descriptor_status_flags(fd).map_err(AttachError::BadDescriptor)?;

        // The stream's one buffer block.
        let buf = StreamBuf::new()?;

        // Descriptor-flag side effects. These mutate kernel state even
        // though attachment can still fail below under the strict policy.
        if mode.close_on_exec {
            match (sys::set_close_on_exec(fd), cloexec) {
                (Err(err), CloexecPolicy::Strict) => {
                    return Err(AttachError::CloexecRejected(err));
                }
                // Lenient: the refusal is not surfaced.
                (Err(_), CloexecPolicy::Lenient) | (Ok(()), _) => {}
            }
        }
        if mode.append && fd_flags & sys::O_APPEND == 0 {
            // Result discarded: the stream keeps append semantics even if
            // the descriptor refuses the flag.
            let _ = sys::set_descriptor_status_flags(fd, fd_flags | sys::O_APPEND);
        }

        // Line buffering only for writable terminal streams. Everything
        // else starts with no flush sentinel active.
        let policy = if mode.writable && sys::is_terminal(fd) {
            BufferPolicy::Line(LINE_TERMINATOR)
        } else {
            BufferPolicy::Unbuffered
        };

        let shared = Arc::new(StreamShared {
            fd,
            mode,
            ops: Box::new(FdOps),
            registry: Arc::downgrade(list),
            state: Mutex::new(StreamState {
                buf,
                policy,
                io_started: false,
                eof: false,
                error: false,
                closed: false,
            }),
        });

        // Published only after the object is complete; failures above
        // leave the list untouched.
        list.insert(&shared);
        Ok(Self { shared })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The underlying file descriptor.
    #[must_use]
    pub fn fd(&self) -> i32 {
        self.shared.fd
    }

    /// Direction and flag requests the stream was attached with.
    #[must_use]
    pub fn mode(&self) -> StreamMode {
        self.shared.mode
    }

    /// Current buffering policy.
    #[must_use]
    pub fn buffer_policy(&self) -> BufferPolicy {
        self.shared.state.lock().policy
    }

    /// Whether the end-of-stream indicator is set.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.shared.state.lock().eof
    }

    /// Whether the error indicator is set.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.shared.state.lock().error
    }

    /// Clear the end-of-stream and error indicators.
    pub fn clear_err(&self) {
        let mut state = self.shared.state.lock();
        state.eof = false;
        state.error = false;
    }

    // -----------------------------------------------------------------------
    // Buffering control
    // -----------------------------------------------------------------------

    /// Change the buffering policy.
    ///
    /// Allowed only before the first read, write or pushback on the
    /// stream; returns `false` once it is too late. The buffer block
    /// itself is never reallocated.
    pub fn set_buffer_policy(&self, policy: BufferPolicy) -> bool {
        let mut state = self.shared.state.lock();
        if state.io_started {
            return false;
        }
        state.policy = policy;
        true
    }

    // -----------------------------------------------------------------------
    // I/O
    // -----------------------------------------------------------------------

    /// Write `data` through the buffering policy.
    ///
    /// Returns `data.len()` on success. On error the error indicator is
    /// set and already-buffered bytes may have partially reached the
    /// descriptor.
    pub fn write(&self, data: &[u8]) -> Result<usize, Errno> {
        self.shared.write_bytes(data)
    }

    /// Read into `out`, serving buffered bytes first.
    ///
    /// Performs at most one descriptor read, so the result may be shorter
    /// than `out`. Returns 0 at end of stream.
    pub fn read(&self, out: &mut [u8]) -> Result<usize, Errno> {
        self.shared.read_bytes(out)
    }

    /// Push one byte back ahead of the read position.
    ///
    /// Succeeds at least once on a fresh readable stream; the reserve is
    /// bounded. Clears the end-of-stream indicator on success.
    pub fn unread(&self, byte: u8) -> bool {
        self.shared.unread_byte(byte)
    }

    /// Flush pending buffered writes to the descriptor.
    pub fn flush(&self) -> Result<(), Errno> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(Errno(EBADF));
        }
        self.shared.flush_pending(&mut state)
    }

    /// Reposition the stream.
    ///
    /// Pending writes are flushed and buffered read-ahead (pushback
    /// included) is discarded before the descriptor seeks, so the new
    /// position is exactly what the descriptor reports.
    pub fn seek(&self, pos: SeekFrom) -> Result<u64, Errno> {
        self.shared.seek_to(pos)
    }

    /// Flush, unlink from the open list, and close the descriptor.
    pub fn close(self) -> Result<(), Errno> {
        // Drop runs right after and re-enters teardown; both halves are
        // idempotent.
        self.teardown()
    }

    fn teardown(&self) -> Result<(), Errno> {
        if let Some(list) = self.shared.registry.upgrade() {
            list.remove(&self.shared);
        }
        self.shared.close_descriptor()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("fd", &self.shared.fd)
            .field("mode", &self.shared.mode)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
