use crate::buffer::SharedBuffer;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::trace;

/// Outcome of one pull from the source.
#[derive(Debug)]
pub(crate) enum Fetched {
    /// This many bytes were appended to the buffer.
    Data(usize),
    /// The source reported end of stream.
    EndOfStream,
    /// The source failed.
    Failed(Arc<io::Error>),
}

/// Sole owner of the underlying source.
///
/// The feeder performs no synchronization of its own: the coordinator only
/// calls it from inside its critical section, so pulls never overlap.
pub(crate) struct SourceFeeder<R> {
    source: Option<R>,
    scratch: Box<[u8]>,
}

impl<R> SourceFeeder<R> {
    pub(crate) fn new(source: R, fetch_size: usize) -> Self {
        Self {
            source: Some(source),
            scratch: vec![0; fetch_size.max(1)].into_boxed_slice(),
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.source.is_none()
    }
}

impl<R> SourceFeeder<R>
where
    R: AsyncRead + Unpin,
{
    /// Pulls up to `fetch_size` more bytes and appends them to `buffer`.
    ///
    /// After a terminal outcome the source is dropped; polling again is a
    /// logic error and reports end of stream.
    pub(crate) fn poll_fetch(
        &mut self,
        cx: &mut Context<'_>,
        buffer: &mut SharedBuffer,
    ) -> Poll<Fetched> {
        let Some(source) = self.source.as_mut() else {
            debug_assert!(false, "fetch after the source was exhausted");
            return Poll::Ready(Fetched::EndOfStream);
        };

        let mut read_buf = ReadBuf::new(&mut self.scratch);
        let outcome = match Pin::new(source).poll_read(cx, &mut read_buf) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(())) if read_buf.filled().is_empty() => Fetched::EndOfStream,
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                buffer.append(filled);
                Fetched::Data(filled.len())
            }
            Poll::Ready(Err(err)) => Fetched::Failed(Arc::new(err)),
        };

        trace!(tail = buffer.tail(), ?outcome, "fetched from source");

        if !matches!(outcome, Fetched::Data(_)) {
            self.source = None;
        }
        Poll::Ready(outcome)
    }
}

impl<R> std::fmt::Debug for SourceFeeder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFeeder")
            .field("exhausted", &self.source.is_none())
            .field("fetch_size", &self.scratch.len())
            .finish()
    }
}
