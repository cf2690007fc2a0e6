use crate::coordinator::{lock, ReadOutcome, SharedCoordinator, Terminal};
use crate::error::Error;
use bytes::Bytes;
use futures_util::future::poll_fn;
use futures_util::ready;
use futures_util::stream::{FusedStream, Stream};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug)]
enum State {
    Open(usize),
    Finished(Terminal),
    Closed,
}

/// One consumer's independent view of a [`ReplicatedStream`](crate::ReplicatedStream).
///
/// Every reader yields the same bytes in the same order as the source,
/// regardless of how fast its siblings read. Bytes are retained until the
/// slowest open reader has consumed them, so a reader that stops reading
/// without being closed holds memory for everyone else. Close or drop readers
/// you no longer need.
///
/// A reader can be consumed three ways:
/// - [`ReplicaReader::read`], returning `Ok(0)` at end of stream;
/// - as a [`tokio::io::AsyncRead`];
/// - as a [`Stream`] of [`Bytes`] chunks.
///
/// # Examples
///
/// ```
/// use replicated_stream::ReplicatedStream;
///
/// # tokio_test::block_on(async {
/// let source: &[u8] = b"one source, many readers";
/// let replicated = ReplicatedStream::new(source);
/// let mut first = replicated.new_reader().unwrap();
/// let mut second = replicated.new_reader().unwrap();
///
/// let mut buf = [0u8; 3];
/// let n = first.read(&mut buf).await.unwrap();
/// assert_eq!(&buf[..n], b"one");
///
/// let n = second.read(&mut buf).await.unwrap();
/// assert_eq!(&buf[..n], b"one");
/// # });
/// ```
pub struct ReplicaReader<R> {
    shared: SharedCoordinator<R>,
    state: State,
    position: u64,
    chunk_size: usize,
}

impl<R> ReplicaReader<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        shared: SharedCoordinator<R>,
        key: usize,
        position: u64,
        chunk_size: usize,
    ) -> Self {
        Self {
            shared,
            state: State::Open(key),
            position,
            chunk_size,
        }
    }

    /// Reads the next bytes of the stream into `buf`.
    ///
    /// Returns the number of bytes copied, which may be less than `buf.len()`.
    /// `Ok(0)` for a non-empty `buf` means the end of the stream was reached;
    /// every later call returns `Ok(0)` again. If the source failed, this
    /// reader first receives every byte produced before the failure and then
    /// [`Error::Io`] on this and every later call.
    ///
    /// Waits while another reader's fetch from the source is in flight.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after [`close`](Self::close), or [`Error::Io`] as above.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return match self.state {
                State::Closed => Err(Error::Closed),
                _ => Ok(0),
            };
        }

        let read = poll_fn(|cx| {
            self.poll_read_with(cx, buf.len(), |bytes| {
                buf[..bytes.len()].copy_from_slice(bytes);
            })
        })
        .await?;

        Ok(read.map_or(0, |(_, len)| len))
    }

    /// Closes the reader and releases its claim on buffered bytes.
    ///
    /// Never waits on the source and never affects other readers. Calling it
    /// again is a no-op. Later reads fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if let State::Open(key) = self.state {
            lock(&self.shared).unregister(key);
        }
        self.state = State::Closed;
    }

    /// Absolute offset of the next byte this reader will receive.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Returns `true` once the end of the stream or a source error was
    /// delivered to this reader.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished(_))
    }

    /// Shared read path. `Ok(None)` means end of stream.
    fn poll_read_with<T>(
        &mut self,
        cx: &mut Context<'_>,
        max_len: usize,
        copy: impl FnOnce(&[u8]) -> T,
    ) -> Poll<Result<Option<(T, usize)>, Error>> {
        let key = match &self.state {
            State::Open(key) => *key,
            State::Finished(terminal) => return Poll::Ready(terminal.to_result().map(|()| None)),
            State::Closed => return Poll::Ready(Err(Error::Closed)),
        };

        let outcome = ready!(lock(&self.shared).poll_read(key, cx, max_len, copy));
        match outcome {
            ReadOutcome::Data { value, len } => {
                self.position += len as u64;
                Poll::Ready(Ok(Some((value, len))))
            }
            ReadOutcome::Finished(terminal) => {
                let result = terminal.to_result().map(|()| None);
                self.state = State::Finished(terminal);
                Poll::Ready(result)
            }
        }
    }
}

impl<R> AsyncRead for ReplicaReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let this = self.get_mut();
        let max_len = buf.remaining();
        ready!(this.poll_read_with(cx, max_len, |bytes| buf.put_slice(bytes)))?;
        Poll::Ready(Ok(()))
    }
}

impl<R> Stream for ReplicaReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // A terminal status is yielded at most once; after that the stream is done.
        if !matches!(self.state, State::Open(_)) {
            return Poll::Ready(None);
        }

        let chunk_size = self.chunk_size;
        match ready!(self.poll_read_with(cx, chunk_size, Bytes::copy_from_slice)) {
            Ok(Some((chunk, _))) => Poll::Ready(Some(Ok(chunk))),
            Ok(None) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl<R> FusedStream for ReplicaReader<R>
where
    R: AsyncRead + Unpin,
{
    fn is_terminated(&self) -> bool {
        !matches!(self.state, State::Open(_))
    }
}

impl<R> Drop for ReplicaReader<R> {
    fn drop(&mut self) {
        if let State::Open(key) = self.state {
            lock(&self.shared).unregister(key);
        }
    }
}

impl<R> std::fmt::Debug for ReplicaReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaReader")
            .field("state", &self.state)
            .field("position", &self.position)
            .finish()
    }
}
