//! A library for replicating one sequential byte source to many independent readers.
//!
//! [`ReplicatedStream`] takes ownership of any [`AsyncRead`](tokio::io::AsyncRead) source and
//! hands out [`ReplicaReader`]s. Every reader sees every byte of the source in order, reading at its
//! own pace and in whatever chunk sizes it likes, while the source itself is read exactly once.
//!
//! # Examples
//!
//! ```
//! use replicated_stream::ReplicatedStream;
//! use tokio::io::AsyncReadExt;
//!
//! # tokio_test::block_on(async {
//! let data = b"the same bytes, twice".to_vec();
//! let replicated = ReplicatedStream::new(&data[..]);
//!
//! // Create one reader per consumer
//! let mut reader1 = replicated.new_reader().unwrap();
//! let mut reader2 = replicated.new_reader().unwrap();
//!
//! // Both readers receive all bytes
//! let mut result1 = Vec::new();
//! let mut result2 = Vec::new();
//! let (n1, n2) = tokio::join!(
//!     reader1.read_to_end(&mut result1),
//!     reader2.read_to_end(&mut result2)
//! );
//!
//! assert_eq!(n1.unwrap(), data.len());
//! assert_eq!(n2.unwrap(), data.len());
//! assert_eq!(result1, data);
//! assert_eq!(result2, data);
//! # });
//! ```
//!
//! # Behavior
//!
//! - A reader that finds no buffered bytes at its position pulls the next chunk from the source on
//!   behalf of everyone. Readers that miss while that pull is in flight wait for it rather than
//!   issuing their own, so at most one pull is ever outstanding.
//! - Fetched bytes are retained until every open reader has consumed them. A reader that stops
//!   reading without being closed holds them for everyone; close or drop readers you no longer need.
//! - End of stream is reported as `Ok(0)`, repeatedly. A source error is reported as
//!   [`Error::Io`] to every reader once it has consumed all bytes that came before the failure,
//!   and on every read after that. The source is never retried.
//! - [`ReplicatedStream::new_reader`] starts at offset 0 and fails with
//!   [`Error::StaleRegistration`] once the first bytes have been discarded.
//!   [`ReplicatedStream::new_reader_from_retained`] joins at the oldest retained byte instead.
//!
//! Readers can also be consumed as a [`Stream`](futures_util::Stream) of
//! [`Bytes`](bytes::Bytes) chunks:
//!
//! ```
//! use replicated_stream::ReplicatedStream;
//! use futures_util::StreamExt;
//!
//! # tokio_test::block_on(async {
//! let source: &[u8] = b"chunked";
//! let replicated = ReplicatedStream::builder().fetch_size(3).build(source);
//! let reader = replicated.new_reader().unwrap();
//!
//! let chunks: Vec<_> = reader.map(|chunk| chunk.unwrap()).collect().await;
//! assert_eq!(chunks, ["chu", "nke", "d"]);
//! # });
//! ```
//!
//! # Thread Safety
//!
//! `ReplicatedStream` and `ReplicaReader` are both [`Send`] and [`Sync`] when the source is
//! [`Send`], so readers can be moved to tasks running on different threads.
//!
//! ```
//! use replicated_stream::ReplicatedStream;
//! use tokio::io::AsyncReadExt;
//! use tokio::task;
//!
//! # tokio_test::block_on(async {
//! let source: &'static [u8] = b"shared across tasks";
//! let replicated = ReplicatedStream::new(source);
//!
//! let mut reader1 = replicated.new_reader().unwrap();
//! let mut reader2 = replicated.new_reader().unwrap();
//!
//! let handle1 = task::spawn(async move {
//!     let mut out = Vec::new();
//!     reader1.read_to_end(&mut out).await.unwrap();
//!     out
//! });
//! let handle2 = task::spawn(async move {
//!     let mut out = Vec::new();
//!     reader2.read_to_end(&mut out).await.unwrap();
//!     out
//! });
//!
//! let (result1, result2) = tokio::join!(handle1, handle2);
//! assert_eq!(result1.unwrap(), source);
//! assert_eq!(result2.unwrap(), source);
//! # });
//! ```
//!
//! # Feature flags
//!
//! - `stats`: enables [`ReplicatedStream::stats`], a live view of active readers, fetch counts and
//!   retained bytes.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod coordinator;
mod error;
mod ext;
mod feeder;
mod notify;
mod reader;
mod replicated;
#[cfg(feature = "stats")]
mod stats;

pub use error::Error;
pub use ext::ReplicateExt;
pub use reader::ReplicaReader;
pub use replicated::{Builder, ReplicatedStream, DEFAULT_FETCH_SIZE};
#[cfg(feature = "stats")]
pub use stats::Stats;
