use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Runtime metrics for a `ReplicatedStream`.
///
/// A lightweight, read-only view of the shared state. Obtain a `Stats` handle
/// via `ReplicatedStream::stats()`. Values use relaxed atomics and are
/// intended for diagnostics.
#[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
#[derive(Debug, Clone)]
pub struct Stats {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    active_readers: AtomicU64,
    fetches: AtomicU64,
    bytes_fetched: AtomicU64,
    buffered_bytes: AtomicU64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Counters::default()),
        }
    }

    pub(crate) fn reader_opened(&self) {
        self.inner.active_readers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reader_closed(&self) {
        self.inner.active_readers.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self, len: usize, buffered: usize) {
        self.inner.fetches.fetch_add(1, Ordering::Relaxed);
        self.inner
            .bytes_fetched
            .fetch_add(len as u64, Ordering::Relaxed);
        self.set_buffered(buffered);
    }

    pub(crate) fn set_buffered(&self, buffered: usize) {
        self.inner
            .buffered_bytes
            .store(buffered as u64, Ordering::Relaxed);
    }

    /// Returns the number of readers still registered with the stream.
    ///
    /// Readers leave the count when they are closed, dropped, or after they
    /// have been handed the end of the stream or a source error.
    pub fn active_readers(&self) -> u64 {
        self.inner.active_readers.load(Ordering::Relaxed)
    }

    /// Returns how many completed pulls were made from the source, including
    /// the final one that reported end of stream or an error.
    pub fn fetches(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    /// Returns the total number of bytes pulled from the source.
    pub fn bytes_fetched(&self) -> u64 {
        self.inner.bytes_fetched.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes currently retained for slower readers.
    pub fn buffered_bytes(&self) -> u64 {
        self.inner.buffered_bytes.load(Ordering::Relaxed)
    }
}
