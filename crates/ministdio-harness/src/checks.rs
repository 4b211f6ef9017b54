//! The attachment property matrix as named, individually runnable
//! checks against live descriptors.

use std::io::SeekFrom;
use std::sync::Arc;

use ministdio_core::errno::EBADF;
use ministdio_core::{
    AttachError, BufferPolicy, CloexecPolicy, Errno, LINE_TERMINATOR, OpenStreamList, Stream,
    StreamMode, sys,
};

use crate::fixtures::{self, FixtureError, STALE_FD, ScratchFile};
use crate::report::{CheckRecord, Outcome};

/// Check-internal verdict. `Skip` is reserved for missing environment
/// hardware, never for assertion failures.
enum CheckError {
    Fail(String),
    Skip(String),
}

impl From<FixtureError> for CheckError {
    fn from(err: FixtureError) -> Self {
        match err {
            FixtureError::PtyUnavailable => Self::Skip(err.to_string()),
            other => Self::Fail(other.to_string()),
        }
    }
}

impl From<Errno> for CheckError {
    fn from(err: Errno) -> Self {
        Self::Fail(err.to_string())
    }
}

impl From<AttachError> for CheckError {
    fn from(err: AttachError) -> Self {
        Self::Fail(format!("attach failed: {err}"))
    }
}

fn ensure(cond: bool, detail: &str) -> Result<(), CheckError> {
    if cond {
        Ok(())
    } else {
        Err(CheckError::Fail(detail.to_string()))
    }
}

type CheckFn = fn(&Arc<OpenStreamList>) -> Result<(), CheckError>;

/// One named conformance check.
pub struct Check {
    /// Stable identifier, used by `run --check` and JSONL records.
    pub name: &'static str,
    /// Statement of the property under test.
    pub property: &'static str,
    run: CheckFn,
}

static CHECKS: [Check; 9] = [
    Check {
        name: "reject-bad-mode-first-char",
        property: "mode strings outside r/w/a fail invalid-argument with no side effects",
        run: reject_bad_mode_first_char,
    },
    Check {
        name: "single-direction-restriction",
        property: "modes without + disallow exactly the opposite direction",
        run: single_direction_restriction,
    },
    Check {
        name: "plus-widens-both-directions",
        property: "a + in the mode allows both reading and writing",
        run: plus_widens_both_directions,
    },
    Check {
        name: "append-flag-propagation",
        property: "append modes raise O_APPEND on the descriptor and the stream",
        run: append_flag_propagation,
    },
    Check {
        name: "file-writer-not-line-buffered",
        property: "writable non-terminal descriptors do not line-buffer",
        run: file_writer_not_line_buffered,
    },
    Check {
        name: "terminal-writer-line-buffered",
        property: "writable terminals line-buffer with the newline sentinel",
        run: terminal_writer_line_buffered,
    },
    Check {
        name: "stale-descriptor-rejected",
        property: "dead descriptor numbers fail the validity probe and register nothing",
        run: stale_descriptor_rejected,
    },
    Check {
        name: "read-only-regular-file",
        property: "mode r on a regular file reads, refuses writes, stays unbuffered",
        run: read_only_regular_file,
    },
    Check {
        name: "combined-append-update-cloexec",
        property: "a+e applies append, both directions and close-on-exec together",
        run: combined_append_update_cloexec,
    },
];

#[must_use]
pub fn all_checks() -> &'static [Check] {
    &CHECKS
}

fn record(check: &Check, result: Result<(), CheckError>) -> CheckRecord {
    let (outcome, detail) = match result {
        Ok(()) => (Outcome::Pass, None),
        Err(CheckError::Fail(detail)) => (Outcome::Fail, Some(detail)),
        Err(CheckError::Skip(detail)) => (Outcome::Skip, Some(detail)),
    };
    CheckRecord {
        check: check.name.to_string(),
        property: check.property.to_string(),
        outcome,
        detail,
    }
}

/// Run one check on a private open-stream list, so list assertions
/// never observe a neighbouring check's streams.
pub fn run_check(check: &Check) -> CheckRecord {
    let list = Arc::new(OpenStreamList::new());
    record(check, (check.run)(&list))
}

#[must_use]
pub fn run_all() -> Vec<CheckRecord> {
    CHECKS.iter().map(run_check).collect()
}

#[must_use]
pub fn run_named(name: &str) -> Option<CheckRecord> {
    CHECKS.iter().find(|check| check.name == name).map(run_check)
}

// ---------------------------------------------------------------------------
// Check bodies
// ---------------------------------------------------------------------------

fn reject_bad_mode_first_char(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    for bad in ["x", "+r", "", "b", " r"] {
        ensure(
            StreamMode::parse(bad).is_none(),
            &format!("mode {bad:?} should not parse"),
        )?;
    }
    let scratch = ScratchFile::create("bad-mode")?;
    match Stream::attach_with(list, scratch.fd(), "x", CloexecPolicy::Lenient) {
        Err(AttachError::InvalidMode) => {}
        other => {
            return Err(CheckError::Fail(format!(
                "expected invalid-mode rejection, got {other:?}"
            )));
        }
    }
    ensure(
        sys::descriptor_status_flags(scratch.fd()).is_ok(),
        "descriptor should survive a rejected mode",
    )?;
    ensure(list.is_empty(), "rejected attach must not register a stream")?;
    Ok(())
}

fn single_direction_restriction(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut reader = ScratchFile::create_with("dir-read", b"payload")?;
    let stream = Stream::attach_with(list, reader.fd(), "r", CloexecPolicy::Lenient)?;
    reader.disarm();
    ensure(
        stream.write(b"x") == Err(Errno(EBADF)),
        "read-only stream accepted a write",
    )?;
    let mut buf = [0u8; 7];
    ensure(
        stream.read(&mut buf)? == 7,
        "read-only stream should read its file",
    )?;
    stream.close()?;

    let mut writer = ScratchFile::create("dir-write")?;
    let stream = Stream::attach_with(list, writer.fd(), "w", CloexecPolicy::Lenient)?;
    writer.disarm();
    let mut buf = [0u8; 4];
    ensure(
        stream.read(&mut buf) == Err(Errno(EBADF)),
        "write-only stream served a read",
    )?;
    ensure(
        stream.write(b"data")? == 4,
        "write-only stream should accept a write",
    )?;
    stream.close()?;
    Ok(())
}

fn plus_widens_both_directions(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut scratch = ScratchFile::create("plus")?;
    let stream = Stream::attach_with(list, scratch.fd(), "w+", CloexecPolicy::Lenient)?;
    scratch.disarm();
    ensure(
        stream.mode().readable && stream.mode().writable,
        "w+ should allow both directions",
    )?;
    stream.write(b"both ways")?;
    stream.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 9];
    let got = stream.read(&mut buf)?;
    ensure(
        &buf[..got] == b"both ways",
        "data written through the stream should read back",
    )?;
    stream.close()?;
    Ok(())
}

fn append_flag_propagation(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut scratch = ScratchFile::create("append")?;
    let before = sys::descriptor_status_flags(scratch.fd())?;
    ensure(
        before & sys::O_APPEND == 0,
        "scratch descriptor should start without O_APPEND",
    )?;
    let stream = Stream::attach_with(list, scratch.fd(), "a", CloexecPolicy::Lenient)?;
    scratch.disarm();
    let after = sys::descriptor_status_flags(stream.fd())?;
    ensure(
        after & sys::O_APPEND != 0,
        "attach should raise O_APPEND on the descriptor",
    )?;
    ensure(stream.mode().append, "stream should carry the append bit")?;
    stream.close()?;
    Ok(())
}

fn file_writer_not_line_buffered(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut scratch = ScratchFile::create("file-writer")?;
    let stream = Stream::attach_with(list, scratch.fd(), "w", CloexecPolicy::Lenient)?;
    scratch.disarm();
    ensure(
        stream.buffer_policy() == BufferPolicy::Unbuffered,
        "regular files must not line-buffer",
    )?;
    stream.close()?;
    Ok(())
}

fn terminal_writer_line_buffered(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut master = fixtures::pty_master()?;
    let stream = Stream::attach_with(list, master.fd(), "w", CloexecPolicy::Lenient)?;
    master.disarm();
    ensure(
        stream.buffer_policy() == BufferPolicy::Line(LINE_TERMINATOR),
        "writable terminal should line-buffer with the newline sentinel",
    )?;
    stream.close()?;
    Ok(())
}

fn stale_descriptor_rejected(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    match Stream::attach_with(list, STALE_FD, "r", CloexecPolicy::Lenient) {
        Err(AttachError::BadDescriptor(err)) => {
            ensure(err == Errno(EBADF), "probe should report EBADF")?;
        }
        other => {
            return Err(CheckError::Fail(format!(
                "expected bad-descriptor rejection, got {other:?}"
            )));
        }
    }
    ensure(list.is_empty(), "failed attach must leave the open list empty")?;
    Ok(())
}

fn read_only_regular_file(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut scratch = ScratchFile::create_with("read-only", b"stdio")?;
    let stream = Stream::attach_with(list, scratch.fd(), "r", CloexecPolicy::Lenient)?;
    scratch.disarm();
    ensure(
        stream.buffer_policy() == BufferPolicy::Unbuffered,
        "regular file reader should not line-buffer",
    )?;
    let mut buf = [0u8; 8];
    let got = stream.read(&mut buf)?;
    ensure(
        &buf[..got] == b"stdio",
        "reader should see the file content",
    )?;
    ensure(
        stream.write(b"x") == Err(Errno(EBADF)),
        "mode r must leave writes disallowed",
    )?;
    stream.close()?;
    Ok(())
}

fn combined_append_update_cloexec(list: &Arc<OpenStreamList>) -> Result<(), CheckError> {
    let mut scratch = ScratchFile::create("combined")?;
    // std opens descriptors close-on-exec; start from a clear flag so
    // the check observes the attach raising it.
    sys::clear_close_on_exec(scratch.fd())?;
    let stream = Stream::attach_with(list, scratch.fd(), "a+e", CloexecPolicy::Lenient)?;
    scratch.disarm();
    let mode = stream.mode();
    ensure(
        mode.readable && mode.writable && mode.append && mode.close_on_exec,
        "a+e should set every mode bit",
    )?;
    let flags = sys::descriptor_status_flags(stream.fd())?;
    ensure(
        flags & sys::O_APPEND != 0,
        "descriptor should gain O_APPEND",
    )?;
    ensure(
        sys::close_on_exec(stream.fd())?,
        "descriptor should gain the close-on-exec flag",
    )?;
    stream.write(b"tail")?;
    stream.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 8];
    let got = stream.read(&mut buf)?;
    ensure(
        &buf[..got] == b"tail",
        "update mode should read back the appended data",
    )?;
    stream.close()?;
    Ok(())
}
