use crate::buffer::SharedBuffer;
use crate::error::Error;
use crate::feeder::{Fetched, SourceFeeder};
use crate::notify::FetchNotifier;
use futures_util::task::waker_ref;
use slab::Slab;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tracing::{debug, trace};

pub(crate) type SharedCoordinator<R> = Arc<Mutex<Coordinator<R>>>;

/// Locks the coordinator. A panic in another reader never leaves the state
/// half-updated, so poisoning is ignored.
pub(crate) fn lock<R>(shared: &Mutex<Coordinator<R>>) -> MutexGuard<'_, Coordinator<R>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the source ended. Recorded once, at the tail offset of the buffer.
#[derive(Debug, Clone)]
pub(crate) enum Terminal {
    EndOfStream,
    Failed(Arc<io::Error>),
}

impl Terminal {
    pub(crate) fn to_result(&self) -> Result<(), Error> {
        match self {
            Terminal::EndOfStream => Ok(()),
            Terminal::Failed(err) => Err(Error::Io(Arc::clone(err))),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ReadOutcome<T> {
    /// `len` bytes were handed to the copy function, which produced `value`.
    Data { value: T, len: usize },
    /// The reader reached the terminal offset and has been unregistered.
    Finished(Terminal),
}

#[derive(Debug)]
struct Cursor {
    offset: u64,
}

/// The monitor behind every reader of one replicated source.
///
/// Owns the shared window, the registry of open readers and the feeder. All
/// of it is mutated only while the surrounding mutex is held.
#[derive(Debug)]
pub(crate) struct Coordinator<R> {
    buffer: SharedBuffer,
    readers: Slab<Cursor>,
    feeder: SourceFeeder<R>,
    notifier: Arc<FetchNotifier>,
    terminal: Option<Terminal>,
    #[cfg(feature = "stats")]
    stats: crate::stats::Stats,
}

impl<R> Coordinator<R> {
    pub(crate) fn new(source: R, fetch_size: usize, initial_capacity: usize) -> Self {
        Self {
            buffer: SharedBuffer::with_capacity(initial_capacity),
            readers: Slab::new(),
            feeder: SourceFeeder::new(source, fetch_size),
            notifier: Arc::new(FetchNotifier::new()),
            terminal: None,
            #[cfg(feature = "stats")]
            stats: crate::stats::Stats::new(),
        }
    }

    /// Registers a reader at offset 0, failing if those bytes are gone.
    pub(crate) fn register_from_start(&mut self) -> Result<usize, Error> {
        let trimmed_to = self.buffer.base();
        if trimmed_to > 0 {
            debug!(trimmed_to, "rejected reader registration at offset 0");
            return Err(Error::StaleRegistration { trimmed_to });
        }
        Ok(self.register_at(0))
    }

    /// Registers a reader at the oldest byte still retained.
    pub(crate) fn register_from_retained(&mut self) -> (usize, u64) {
        let offset = self.buffer.base();
        (self.register_at(offset), offset)
    }

    fn register_at(&mut self, offset: u64) -> usize {
        let key = self.readers.insert(Cursor { offset });
        debug!(key, offset, open = self.readers.len(), "registered reader");

        #[cfg(feature = "stats")]
        self.stats.reader_opened();

        key
    }

    pub(crate) fn retained_from(&self) -> u64 {
        self.buffer.base()
    }

    /// Removes reader `key` from the registry.
    pub(crate) fn unregister(&mut self, key: usize) {
        if self.readers.try_remove(key).is_none() {
            return;
        }
        self.notifier.forget(key);

        #[cfg(feature = "stats")]
        self.stats.reader_closed();

        debug!(key, open = self.readers.len(), "unregistered reader");
        self.trim();
    }

    /// Discards bytes every open reader has already consumed.
    ///
    /// Wakes no one: dropping consumed bytes never makes a read satisfiable.
    fn trim(&mut self) {
        let trim_point = self
            .readers
            .iter()
            .map(|(_, cursor)| cursor.offset)
            .min()
            .unwrap_or_else(|| self.buffer.tail());

        let dropped = self.buffer.trim_to(trim_point);
        if dropped > 0 {
            trace!(
                dropped,
                base = self.buffer.base(),
                retained = self.buffer.len(),
                "trimmed shared buffer"
            );
        }

        #[cfg(feature = "stats")]
        self.stats.set_buffered(self.buffer.len());
    }

    #[cfg(feature = "stats")]
    pub(crate) fn stats(&self) -> crate::stats::Stats {
        self.stats.clone()
    }
}

impl<R> Coordinator<R>
where
    R: AsyncRead + Unpin,
{
    /// Reads up to `max_len` bytes for reader `key`, handing them to `copy`.
    ///
    /// Fetches from the source when the reader has caught up with the tail,
    /// unless a fetch is already waiting on the source, in which case this
    /// reader parks until the source wakes. The source is always polled with
    /// the shared notifier, so its wake reaches every parked reader even if
    /// the task that started the fetch has gone away.
    pub(crate) fn poll_read<T>(
        &mut self,
        key: usize,
        cx: &mut Context<'_>,
        max_len: usize,
        copy: impl FnOnce(&[u8]) -> T,
    ) -> Poll<ReadOutcome<T>> {
        debug_assert!(max_len > 0, "zero-length reads never reach the coordinator");

        loop {
            let offset = self.readers[key].offset;
            let available = self.buffer.slice(offset, max_len);

            if !available.is_empty() {
                let len = available.len();
                let value = copy(available);

                self.readers[key].offset += len as u64;
                self.notifier.forget(key);
                self.trim();

                return Poll::Ready(ReadOutcome::Data { value, len });
            }

            if let Some(terminal) = self.terminal.clone() {
                debug!(key, offset, ?terminal, "reader reached terminal status");
                self.unregister(key);
                return Poll::Ready(ReadOutcome::Finished(terminal));
            }

            if !self.notifier.park(key, cx.waker()) {
                trace!(key, offset, "waiting on in-flight fetch");
                return Poll::Pending;
            }

            debug_assert!(!self.feeder.is_exhausted());
            let fetched = {
                let waker = waker_ref(&self.notifier);
                let mut fetch_cx = Context::from_waker(&waker);
                match self.feeder.poll_fetch(&mut fetch_cx, &mut self.buffer) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(fetched) => fetched,
                }
            };
            self.publish(fetched);
        }
    }

    fn publish(&mut self, fetched: Fetched) {
        #[cfg(feature = "stats")]
        {
            let len = match fetched {
                Fetched::Data(len) => len,
                _ => 0,
            };
            self.stats.record_fetch(len, self.buffer.len());
        }

        match fetched {
            Fetched::Data(_) => {}
            Fetched::EndOfStream => {
                debug!(offset = self.buffer.tail(), "source reached end of stream");
                self.terminal = Some(Terminal::EndOfStream);
            }
            Fetched::Failed(err) => {
                debug!(offset = self.buffer.tail(), error = %err, "source failed");
                self.terminal = Some(Terminal::Failed(err));
            }
        }

        self.notifier.notify();
    }
}
