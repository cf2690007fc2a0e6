use std::io;
use std::sync::Arc;

/// Errors returned by [`ReplicatedStream`](crate::ReplicatedStream) and
/// [`ReplicaReader`](crate::ReplicaReader).
///
/// End of stream is not an error: reads report it as `Ok(0)`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The reader was closed and can no longer be read from.
    #[error("reader is closed")]
    Closed,

    /// The source failed. Every reader that reaches the failing offset sees the
    /// same underlying error.
    #[error("source read failed: {0}")]
    Io(#[source] Arc<io::Error>),

    /// A reader starting at offset 0 was requested after the bytes it needs
    /// had already been discarded.
    #[error("cannot start a reader at offset 0, bytes before {trimmed_to} were already discarded")]
    StaleRegistration {
        /// Offset of the oldest byte still retained.
        trimmed_to: u64,
    },
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Closed => io::ErrorKind::BrokenPipe,
            Error::Io(source) => source.kind(),
            Error::StaleRegistration { .. } => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
