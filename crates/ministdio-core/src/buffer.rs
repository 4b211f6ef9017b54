//! Stream buffer storage.
//!
//! Reference: POSIX.1-2024 setvbuf, ungetc; ISO C11 7.21.3.
//!
//! Design: one contiguous block per stream, allocated once at attach time
//! and never resized. The first [`UNGET`] bytes are a pushback reserve the
//! read cursor may descend into; the main area starts at offset `UNGET`.
//! This module is pure storage and cursor arithmetic. Flush-through policy
//! lives with the stream, which owns the operation table.

use std::collections::TryReserveError;

/// Main buffer area size for every attached stream.
pub const BUFSIZ: usize = 1024;

/// Pushback reserve size, ahead of the main area.
pub const UNGET: usize = 8;

/// Byte that triggers flush-through on line-buffered streams.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Buffering policy of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Every write goes straight to the descriptor.
    Unbuffered,
    /// Buffered writes flush through the last occurrence of the byte.
    Line(u8),
    /// Buffered writes flush when the main area fills.
    Full,
}

/// The single buffer block of a stream.
///
/// Invariants:
/// - `data.len() == UNGET + BUFSIZ`, fixed for the stream's lifetime
/// - read side: `rpos <= rend <= UNGET + BUFSIZ`; `rpos < UNGET` only via
///   pushback
/// - write side: `UNGET <= wpos <= UNGET + BUFSIZ`
/// - at most one side holds data at a time; the stream discards or
///   flushes before switching direction
#[derive(Debug)]
pub struct StreamBuf {
    data: Vec<u8>,
    /// Read cursor.
    rpos: usize,
    /// End of valid read data.
    rend: usize,
    /// End of pending write data.
    wpos: usize,
}

impl StreamBuf {
    /// Allocate the block.
    ///
    /// Reports allocator failure instead of aborting, so attachment can
    /// surface resource exhaustion as an error.
    pub fn new() -> Result<Self, TryReserveError> {
        let mut data = Vec::new();
        data.try_reserve_exact(UNGET + BUFSIZ)?;
        data.resize(UNGET + BUFSIZ, 0);
        Ok(Self {
            data,
            rpos: UNGET,
            rend: UNGET,
            wpos: UNGET,
        })
    }

    /// Main-area capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len() - UNGET
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// Bytes buffered and not yet consumed (pushback included).
    #[must_use]
    pub fn readable(&self) -> usize {
        self.rend - self.rpos
    }

    /// Copy buffered bytes into `out`, advancing the read cursor.
    pub fn take_read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.readable());
        out[..n].copy_from_slice(&self.data[self.rpos..self.rpos + n]);
        self.rpos += n;
        n
    }

    /// The whole main area, for refilling from the descriptor.
    pub fn fill_area(&mut self) -> &mut [u8] {
        debug_assert_eq!(self.wpos, UNGET, "refill with pending write data");
        &mut self.data[UNGET..]
    }

    /// Declare the first `n` bytes of the main area valid for reading.
    pub fn commit_fill(&mut self, n: usize) {
        debug_assert!(n <= BUFSIZ);
        debug_assert_eq!(self.readable(), 0, "refill with unread data");
        self.rpos = UNGET;
        self.rend = UNGET + n;
    }

    /// Push one byte back ahead of the read cursor.
    ///
    /// Returns `false` once the reserve is exhausted. The pushed byte need
    /// not match what was read; it is simply what the next read returns.
    pub fn unread(&mut self, byte: u8) -> bool {
        if self.rpos == 0 {
            return false;
        }
        self.rpos -= 1;
        self.data[self.rpos] = byte;
        true
    }

    /// Drop buffered read data and any pushback.
    pub fn discard_read(&mut self) {
        self.rpos = UNGET;
        self.rend = UNGET;
    }

    // -----------------------------------------------------------------------
    // Write side
    // -----------------------------------------------------------------------

    /// Pending written bytes not yet flushed to the descriptor.
    #[must_use]
    pub fn pending_write(&self) -> &[u8] {
        &self.data[UNGET..self.wpos]
    }

    /// Main-area space left for buffered writes.
    #[must_use]
    pub fn write_space(&self) -> usize {
        UNGET + BUFSIZ - self.wpos
    }

    /// Buffer bytes for a later flush. Returns the count actually taken.
    pub fn push_write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.write_space());
        self.data[self.wpos..self.wpos + n].copy_from_slice(&data[..n]);
        self.wpos += n;
        n
    }

    /// Forget pending write data after a successful flush.
    pub fn mark_flushed(&mut self) {
        self.wpos = UNGET;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
