//! Extension trait for converting byte sources into `ReplicatedStream`.
//!
//! This module provides the `ReplicateExt` trait which adds a `replicate` method
//! to any type that implements `AsyncRead + Unpin`.

use crate::ReplicatedStream;
use tokio::io::AsyncRead;

/// Extension trait for [`AsyncRead`] that provides the `replicate` method.
///
/// This trait allows any reader that meets the requirements to be easily
/// converted into a [`ReplicatedStream`] for sharing across multiple consumers.
pub trait ReplicateExt: AsyncRead {
    /// Converts this reader into a [`ReplicatedStream`] with default settings.
    ///
    /// This method consumes the source. Readers are then created with
    /// [`ReplicatedStream::new_reader`] and each sees every byte of the source.
    ///
    /// ```
    /// use replicated_stream::{ReplicatedStream, ReplicateExt};
    ///
    /// let source: &[u8] = b"hello world";
    /// let replicated: ReplicatedStream<_> = source.replicate();
    /// let reader = replicated.new_reader().unwrap();
    /// ```
    fn replicate(self) -> ReplicatedStream<Self>
    where
        Self: Sized + Unpin,
    {
        ReplicatedStream::new(self)
    }
}

impl<R> ReplicateExt for R where R: AsyncRead {}
