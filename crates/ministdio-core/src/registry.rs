//! Process-wide open-stream bookkeeping.
//!
//! Every successfully attached stream is published here so that exit-time
//! bulk flush can find it. Entries are weak: the list never owns a stream,
//! and one dropped without an explicit close simply ages out on the next
//! scan.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::stream::StreamShared;

/// Lock-protected list of live streams.
#[derive(Debug, Default)]
pub struct OpenStreamList {
    entries: Mutex<Vec<Weak<StreamShared>>>,
}

impl OpenStreamList {
    /// Create a new empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a freshly constructed stream into the list.
    pub(crate) fn insert(&self, stream: &Arc<StreamShared>) {
        self.entries.lock().push(Arc::downgrade(stream));
    }

    /// Unlink a stream by identity. Idempotent; dead entries are pruned
    /// on the way through.
    pub(crate) fn remove(&self, stream: &Arc<StreamShared>) {
        self.entries.lock().retain(|w| match w.upgrade() {
            Some(live) => !Arc::ptr_eq(&live, stream),
            None => false,
        });
    }

    /// Snapshot the currently live streams, pruning dead entries.
    ///
    /// The snapshot is taken under the list lock; callers work through it
    /// afterwards so per-stream locks are never taken under the list lock.
    pub(crate) fn live(&self) -> Vec<Arc<StreamShared>> {
        let mut entries = self.entries.lock();
        entries.retain(|w| w.strong_count() > 0);
        entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of live streams in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether no live stream is linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static OPEN_STREAMS: OnceLock<Arc<OpenStreamList>> = OnceLock::new();

/// The process-wide list that [`crate::stream::Stream::attach`] publishes
/// into.
#[must_use]
pub fn open_stream_list() -> &'static Arc<OpenStreamList> {
    OPEN_STREAMS.get_or_init(|| Arc::new(OpenStreamList::new()))
}

/// Flush pending writes on every live stream in `list`.
///
/// This is the exit-time sweep: streams that fail to flush keep their
/// error indicator set. Returns the number of failures.
pub fn flush_open_streams(list: &OpenStreamList) -> usize {
    list.live()
        .iter()
        .filter(|shared| shared.flush_locked().is_err())
        .count()
}

#[cfg(test)]
mod tests {
    use std::os::fd::IntoRawFd;

    use super::*;
    use crate::config::CloexecPolicy;
    use crate::stream::Stream;

    fn dev_null_fd() -> i32 {
        std::fs::File::options()
            .write(true)
            .open("/dev/null")
            .expect("open /dev/null")
            .into_raw_fd()
    }

    #[test]
    fn test_insert_on_attach_remove_on_close() {
        let list = Arc::new(OpenStreamList::new());
        assert!(list.is_empty());

        let stream = Stream::attach_with(&list, dev_null_fd(), "w", CloexecPolicy::Lenient)
            .expect("attach /dev/null");
        assert_eq!(list.len(), 1);

        stream.close().expect("close");
        assert!(list.is_empty());
    }

    #[test]
    fn test_dropped_stream_ages_out() {
        let list = Arc::new(OpenStreamList::new());
        {
            let _stream = Stream::attach_with(&list, dev_null_fd(), "w", CloexecPolicy::Lenient)
                .expect("attach /dev/null");
            assert_eq!(list.len(), 1);
        }
        // Drop unlinked it; either way no live entry remains.
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_outlived_by_stream() {
        let list = Arc::new(OpenStreamList::new());
        let stream = Stream::attach_with(&list, dev_null_fd(), "w", CloexecPolicy::Lenient)
            .expect("attach /dev/null");
        drop(list);
        // The stream holds only a weak edge to the list and stays usable.
        assert!(stream.mode().writable);
        stream.close().expect("close after list dropped");
    }

    #[test]
    fn test_flush_open_streams_counts_failures() {
        let list = Arc::new(OpenStreamList::new());
        let a = Stream::attach_with(&list, dev_null_fd(), "w", CloexecPolicy::Lenient)
            .expect("attach a");
        let b = Stream::attach_with(&list, dev_null_fd(), "w", CloexecPolicy::Lenient)
            .expect("attach b");
        assert_eq!(flush_open_streams(&list), 0);
        a.close().expect("close a");
        b.close().expect("close b");
    }

    #[test]
    fn test_global_list_is_shared() {
        assert!(Arc::ptr_eq(open_stream_list(), open_stream_list()));
    }
}
