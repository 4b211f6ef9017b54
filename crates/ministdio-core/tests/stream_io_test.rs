//! Integration tests for buffered stream I/O and the open-list sweep.

use std::io::SeekFrom;
use std::os::fd::IntoRawFd;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use ministdio_core::{
    BUFSIZ, BufferPolicy, CloexecPolicy, OpenStreamList, Stream, flush_open_streams,
};

static TEMP_SEQ: AtomicU32 = AtomicU32::new(0);

fn temp_path(tag: &str) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "ministdio-io-{}-{seq}-{tag}.tmp",
        std::process::id()
    ))
}

fn temp_fd(tag: &str) -> (PathBuf, i32) {
    let path = temp_path(tag);
    let file = std::fs::File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .expect("open temp file");
    (path, file.into_raw_fd())
}

fn attach(list: &Arc<OpenStreamList>, fd: i32, mode: &str) -> Stream {
    Stream::attach_with(list, fd, mode, CloexecPolicy::Lenient).expect("attach")
}

#[test]
fn buffered_reads_serve_from_one_fill() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("fills");
    std::fs::write(&path, b"0123456789").expect("seed");
    let stream = attach(&list, fd, "r");

    // Byte-at-a-time reads drain the buffer filled by the first call.
    let mut collected = Vec::new();
    let mut one = [0u8; 1];
    while stream.read(&mut one).expect("read") == 1 {
        collected.push(one[0]);
    }
    assert_eq!(collected, b"0123456789");
    assert!(stream.is_eof());

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn large_read_bypasses_the_buffer() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("large");
    let payload = vec![b'p'; BUFSIZ * 2 + 17];
    std::fs::write(&path, &payload).expect("seed");
    let stream = attach(&list, fd, "r");

    let mut out = vec![0u8; BUFSIZ * 3];
    let mut total = 0;
    loop {
        let n = stream.read(&mut out[total..]).expect("read");
        if n == 0 {
            break;
        }
        total += n;
    }
    assert_eq!(&out[..total], &payload[..]);

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn pushback_interleaves_with_buffered_reads() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("pushback");
    std::fs::write(&path, b"stream").expect("seed");
    let stream = attach(&list, fd, "r");

    let mut two = [0u8; 2];
    assert_eq!(stream.read(&mut two), Ok(2));
    assert_eq!(&two, b"st");

    assert!(stream.unread(b't'));
    assert!(stream.unread(b'S'));

    let mut rest = [0u8; 16];
    assert_eq!(stream.read(&mut rest), Ok(6));
    assert_eq!(&rest[..6], b"Stream");

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn line_policy_across_multiple_writes() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("lines");
    let stream = attach(&list, fd, "w");
    assert!(stream.set_buffer_policy(BufferPolicy::Line(b'\n')));

    assert_eq!(stream.write(b"alpha"), Ok(5));
    assert_eq!(std::fs::read(&path).expect("read back"), b"");
    assert_eq!(stream.write(b" beta\ngam"), Ok(9));
    // Buffered "alpha" flushed together with the data through the newline.
    assert_eq!(std::fs::read(&path).expect("read back"), b"alpha beta\n");
    assert_eq!(stream.write(b"ma\n"), Ok(3));
    assert_eq!(std::fs::read(&path).expect("read back"), b"alpha beta\ngamma\n");

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn custom_line_terminator_is_honored() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("terminator");
    let stream = attach(&list, fd, "w");
    assert!(stream.set_buffer_policy(BufferPolicy::Line(b';')));

    assert_eq!(stream.write(b"a;b"), Ok(3));
    assert_eq!(std::fs::read(&path).expect("read back"), b"a;");
    stream.flush().expect("flush");
    assert_eq!(std::fs::read(&path).expect("read back"), b"a;b");

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn seek_synchronizes_buffered_state() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("seek");
    let stream = attach(&list, fd, "w+");
    assert!(stream.set_buffer_policy(BufferPolicy::Full));

    assert_eq!(stream.write(b"abcdef"), Ok(6));
    // Seek must flush the pending bytes before repositioning.
    assert_eq!(stream.seek(SeekFrom::Start(2)), Ok(2));
    assert_eq!(std::fs::read(&path).expect("read back"), b"abcdef");

    let mut buf = [0u8; 2];
    assert_eq!(stream.read(&mut buf), Ok(2));
    assert_eq!(&buf, b"cd");

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn close_flushes_pending_writes() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("closeflush");
    let stream = attach(&list, fd, "w");
    assert!(stream.set_buffer_policy(BufferPolicy::Full));
    assert_eq!(stream.write(b"tail"), Ok(4));
    assert_eq!(std::fs::read(&path).expect("read back"), b"");

    stream.close().expect("close");
    assert_eq!(std::fs::read(&path).expect("read back"), b"tail");
    let _ = std::fs::remove_file(path);
}

#[test]
fn sweep_flushes_every_open_stream() {
    let list = Arc::new(OpenStreamList::new());
    let (path_a, fd_a) = temp_fd("sweep-a");
    let (path_b, fd_b) = temp_fd("sweep-b");

    let a = attach(&list, fd_a, "w");
    let b = attach(&list, fd_b, "w");
    assert!(a.set_buffer_policy(BufferPolicy::Full));
    assert!(b.set_buffer_policy(BufferPolicy::Full));

    assert_eq!(a.write(b"first"), Ok(5));
    assert_eq!(b.write(b"second"), Ok(6));
    assert_eq!(std::fs::read(&path_a).expect("read a"), b"");
    assert_eq!(std::fs::read(&path_b).expect("read b"), b"");

    assert_eq!(flush_open_streams(&list), 0);
    assert_eq!(std::fs::read(&path_a).expect("read a"), b"first");
    assert_eq!(std::fs::read(&path_b).expect("read b"), b"second");

    // Streams stay open and writable after the sweep.
    assert_eq!(a.write(b"!"), Ok(1));
    a.close().expect("close a");
    b.close().expect("close b");

    let _ = std::fs::remove_file(path_a);
    let _ = std::fs::remove_file(path_b);
}

#[test]
fn append_stream_writes_at_end_despite_seek() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("appendend");
    std::fs::write(&path, b"base").expect("seed");
    let stream = attach(&list, fd, "a");

    // O_APPEND makes the kernel ignore the position for writes.
    assert_eq!(stream.seek(SeekFrom::Start(0)), Ok(0));
    assert_eq!(stream.write(b"+tail"), Ok(5));
    stream.flush().expect("flush");
    assert_eq!(std::fs::read(&path).expect("read back"), b"base+tail");

    stream.close().expect("close");
    let _ = std::fs::remove_file(path);
}

#[test]
fn closed_stream_errors_do_not_crash_sweep() {
    let list = Arc::new(OpenStreamList::new());
    let (path, fd) = temp_fd("sweepclosed");
    let stream = attach(&list, fd, "w");
    stream.close().expect("close");
    // Nothing live remains; the sweep sees an empty list.
    assert_eq!(flush_open_streams(&list), 0);
    let _ = std::fs::remove_file(path);
}
