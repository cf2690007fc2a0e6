use crate::coordinator::{lock, Coordinator, SharedCoordinator};
use crate::error::Error;
use crate::reader::ReplicaReader;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;

/// Default number of bytes requested from the source per fetch.
pub const DEFAULT_FETCH_SIZE: usize = 32 * 1024;

/// Configures a [`ReplicatedStream`] before it takes ownership of its source.
///
/// ```
/// use replicated_stream::ReplicatedStream;
///
/// let source: &[u8] = b"configured";
/// let replicated = ReplicatedStream::builder()
///     .fetch_size(4096)
///     .initial_capacity(64 * 1024)
///     .build(source);
/// # let _ = replicated;
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    fetch_size: usize,
    initial_capacity: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            fetch_size: DEFAULT_FETCH_SIZE,
            initial_capacity: DEFAULT_FETCH_SIZE,
        }
    }
}

impl Builder {
    /// Creates a builder with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of bytes pulled from the source in one fetch, and the
    /// largest chunk a reader yields when consumed as a [`Stream`](futures_util::Stream).
    ///
    /// Values below 1 are raised to 1.
    pub fn fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    /// Capacity reserved up front for bytes retained between readers.
    pub fn initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Wraps `source` in a [`ReplicatedStream`] using these settings.
    pub fn build<R>(self, source: R) -> ReplicatedStream<R>
    where
        R: AsyncRead + Unpin,
    {
        ReplicatedStream {
            shared: Arc::new(Mutex::new(Coordinator::new(
                source,
                self.fetch_size,
                self.initial_capacity,
            ))),
            fetch_size: self.fetch_size,
        }
    }
}

/// Replicates one sequential byte source to any number of independent readers.
///
/// `ReplicatedStream` takes ownership of an [`AsyncRead`] source and hands out
/// [`ReplicaReader`]s. Each reader sees every byte of the source, in order,
/// at its own pace and in whatever chunk sizes it asks for. The source itself
/// is read exactly once: a reader that runs out of buffered bytes pulls the
/// next chunk for everyone, and readers that arrive while that pull is in
/// flight wait for it instead of starting another.
///
/// Bytes are kept only until every open reader has consumed them.
///
/// # Examples
///
/// ```
/// use replicated_stream::ReplicatedStream;
///
/// # tokio_test::block_on(async {
/// let source: &[u8] = b"hello world";
/// let replicated = ReplicatedStream::new(source);
///
/// let mut first = replicated.new_reader().unwrap();
/// let mut second = replicated.new_reader().unwrap();
///
/// let mut a = Vec::new();
/// let mut b = Vec::new();
/// let mut buf = [0u8; 4];
/// loop {
///     let n = first.read(&mut buf).await.unwrap();
///     if n == 0 { break; }
///     a.extend_from_slice(&buf[..n]);
/// }
/// loop {
///     let n = second.read(&mut buf).await.unwrap();
///     if n == 0 { break; }
///     b.extend_from_slice(&buf[..n]);
/// }
///
/// assert_eq!(a, b"hello world");
/// assert_eq!(b, b"hello world");
/// # });
/// ```
///
/// # Late readers
///
/// [`new_reader`](Self::new_reader) always starts at the first byte of the
/// source and fails with [`Error::StaleRegistration`] once that byte has been
/// discarded. To join at whatever is still retained instead, use
/// [`new_reader_from_retained`](Self::new_reader_from_retained).
///
/// ```
/// use replicated_stream::{Error, ReplicatedStream};
///
/// # tokio_test::block_on(async {
/// let source: &[u8] = b"abcdef";
/// let replicated = ReplicatedStream::new(source);
///
/// let mut early = replicated.new_reader().unwrap();
/// let mut buf = [0u8; 4];
/// early.read(&mut buf).await.unwrap();
///
/// assert!(matches!(
///     replicated.new_reader(),
///     Err(Error::StaleRegistration { trimmed_to: 4 })
/// ));
///
/// let late = replicated.new_reader_from_retained();
/// assert_eq!(late.position(), 4);
/// # });
/// ```
pub struct ReplicatedStream<R> {
    shared: SharedCoordinator<R>,
    fetch_size: usize,
}

impl<R> Clone for ReplicatedStream<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            fetch_size: self.fetch_size,
        }
    }
}

impl ReplicatedStream<()> {
    /// Returns a [`Builder`] for tuning fetch size and buffer capacity.
    ///
    /// The source type is chosen by [`Builder::build`].
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl<R> ReplicatedStream<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a new `ReplicatedStream` from the given source with default settings.
    pub fn new(source: R) -> Self {
        Builder::new().build(source)
    }

    /// Creates a reader positioned at the first byte of the source.
    ///
    /// # Errors
    ///
    /// [`Error::StaleRegistration`] if bytes at the start of the source have
    /// already been discarded because no open reader needed them.
    pub fn new_reader(&self) -> Result<ReplicaReader<R>, Error> {
        let key = lock(&self.shared).register_from_start()?;
        Ok(ReplicaReader::new(
            Arc::clone(&self.shared),
            key,
            0,
            self.fetch_size,
        ))
    }

    /// Creates a reader positioned at the oldest byte still retained.
    ///
    /// Unlike [`new_reader`](Self::new_reader) this never fails, but the reader
    /// may miss the start of the source. Its starting offset is available
    /// through [`ReplicaReader::position`].
    pub fn new_reader_from_retained(&self) -> ReplicaReader<R> {
        let (key, offset) = lock(&self.shared).register_from_retained();
        ReplicaReader::new(Arc::clone(&self.shared), key, offset, self.fetch_size)
    }

    /// Absolute offset of the oldest byte still retained for readers.
    pub fn retained_from(&self) -> u64 {
        lock(&self.shared).retained_from()
    }

    /// Returns a live view of this stream's runtime metrics.
    ///
    /// ```
    /// use replicated_stream::ReplicatedStream;
    ///
    /// let source: &[u8] = b"abc";
    /// let replicated = ReplicatedStream::new(source);
    /// let stats = replicated.stats();
    /// assert_eq!(stats.active_readers(), 0);
    ///
    /// let reader = replicated.new_reader().unwrap();
    /// assert_eq!(stats.active_readers(), 1);
    ///
    /// drop(reader);
    /// assert_eq!(stats.active_readers(), 0);
    /// ```
    #[cfg(feature = "stats")]
    #[cfg_attr(docsrs, doc(cfg(feature = "stats")))]
    pub fn stats(&self) -> crate::stats::Stats {
        lock(&self.shared).stats()
    }
}

impl<R> std::fmt::Debug for ReplicatedStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedStream")
            .field("fetch_size", &self.fetch_size)
            .finish_non_exhaustive()
    }
}
