use bytes::Bytes;
use futures_util::stream::Stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

// --- Data and Constants ---

pub const NUM_CONSUMERS: usize = 5;
pub const READ_SIZE: usize = 16 * 1024;

pub fn generate_data(len: usize) -> Arc<Vec<u8>> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(len as u64).fill(&mut data[..]);
    Arc::new(data)
}

// --- Channel Fan-Out Implementation ---

pub fn run_channel_fan_out<R>(mut source: R) -> Vec<ReceiverStream<Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut txs = Vec::new();
    let mut rx_streams = Vec::new();
    for _ in 0..NUM_CONSUMERS {
        let (tx, rx) = mpsc::channel(1024); // Buffered channel
        txs.push(tx);
        rx_streams.push(ReceiverStream::new(rx));
    }

    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_SIZE];
        loop {
            let n = match source.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);
            for tx in &txs {
                let _ = tx.send(chunk.clone()).await;
            }
        }
    });
    rx_streams
}

// --- Sources ---

// Source A: In-Memory (Minimal Read Latency)
pub fn in_memory_source(data: &Arc<Vec<u8>>) -> io::Cursor<Vec<u8>> {
    io::Cursor::new(data.to_vec())
}

// Source B: Simulated I/O (Introducing Context Switches)
pub struct SimulatedIoSource {
    data: Arc<Vec<u8>>,
    pos: usize,
    ready: bool,
}

impl AsyncRead for SimulatedIoSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // Every other poll parks the task and wakes it straight away,
        // forcing a poll loop similar to real I/O readiness.
        if !self.ready {
            self.ready = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }
        self.ready = false;

        let end = (self.pos + buf.remaining().min(READ_SIZE)).min(self.data.len());
        buf.put_slice(&self.data[self.pos..end]);
        self.pos = end;
        Poll::Ready(Ok(()))
    }
}

pub fn simulated_io_source(data: &Arc<Vec<u8>>) -> SimulatedIoSource {
    SimulatedIoSource {
        data: Arc::clone(data),
        pos: 0,
        ready: false,
    }
}

// --- Consumers ---

pub async fn consume_chunks<S>(mut stream: S) -> usize
where
    S: Stream + Unpin,
    S::Item: AsRef<[u8]>,
{
    use futures_util::StreamExt;

    let mut consumed = 0;
    while let Some(chunk) = stream.next().await {
        consumed += chunk.as_ref().len();
    }
    consumed
}
