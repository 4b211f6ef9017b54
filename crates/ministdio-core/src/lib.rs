//! # ministdio-core
//!
//! A minimal stdio core: attach already-open file descriptors to buffered
//! stream objects.
//!
//! Attachment validates a mode string against the descriptor's kernel
//! flags, allocates one fixed buffer block with a pushback reserve, picks
//! line buffering for writable terminals, and publishes the stream in a
//! process-wide open list so exit-time code can flush everything.
//!
//! No `unsafe` code is permitted at the crate level; the host-call
//! wrappers in [`sys`] are the single gated exception.

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod errno;
pub mod mode;
pub mod ops;
pub mod registry;
pub mod stream;
#[allow(unsafe_code)]
pub mod sys;

pub use buffer::{BUFSIZ, BufferPolicy, LINE_TERMINATOR, UNGET};
pub use config::CloexecPolicy;
pub use errno::Errno;
pub use mode::StreamMode;
pub use ops::{FdOps, StreamOps};
pub use registry::{OpenStreamList, flush_open_streams, open_stream_list};
pub use stream::{AttachError, Stream};
