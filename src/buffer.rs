use bytes::{Buf, BytesMut};

/// The window of fetched bytes that at least one reader still needs.
///
/// Bytes are addressed by their absolute position in the source. The window
/// covers `[base, base + len)`: it grows at the tail as the feeder appends and
/// shrinks at the head as the coordinator trims behind the slowest reader.
#[derive(Debug)]
pub(crate) struct SharedBuffer {
    base: u64,
    bytes: BytesMut,
}

impl SharedBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            base: 0,
            bytes: BytesMut::with_capacity(capacity),
        }
    }

    /// Absolute offset of the oldest retained byte.
    pub(crate) fn base(&self) -> u64 {
        self.base
    }

    /// Absolute offset one past the newest fetched byte.
    pub(crate) fn tail(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Returns up to `max_len` contiguous bytes starting at `offset`.
    ///
    /// An empty slice means `offset` sits at the tail and more bytes must be
    /// fetched first.
    ///
    /// # Panics
    ///
    /// Panics if `offset` was already trimmed away or lies beyond the tail.
    /// Either one means a reader cursor went out of sync with the window.
    pub(crate) fn slice(&self, offset: u64, max_len: usize) -> &[u8] {
        assert!(
            offset >= self.base,
            "stale read at offset {offset}, buffer already trimmed to {}",
            self.base
        );
        assert!(
            offset <= self.tail(),
            "read at offset {offset} beyond fetched tail {}",
            self.tail()
        );

        let start = (offset - self.base) as usize;
        let end = start + max_len.min(self.bytes.len() - start);
        &self.bytes[start..end]
    }

    /// Discards every byte below `offset`. Returns how many bytes were dropped.
    ///
    /// The base never moves backward and never past the tail.
    pub(crate) fn trim_to(&mut self, offset: u64) -> usize {
        let target = offset.min(self.tail());
        if target <= self.base {
            return 0;
        }

        let count = (target - self.base) as usize;
        self.bytes.advance(count);
        self.base = target;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(data: &[u8]) -> SharedBuffer {
        let mut buffer = SharedBuffer::with_capacity(16);
        buffer.append(data);
        buffer
    }

    #[test]
    fn test_slice_is_bounded_by_tail_and_max_len() {
        let buffer = filled(b"hello world");

        assert_eq!(buffer.slice(0, 5), b"hello");
        assert_eq!(buffer.slice(6, 100), b"world");
        assert_eq!(buffer.slice(3, 0), b"");
    }

    #[test]
    fn test_slice_at_tail_is_empty() {
        let buffer = filled(b"abc");

        assert_eq!(buffer.tail(), 3);
        assert!(buffer.slice(3, 10).is_empty());
    }

    #[test]
    fn test_trim_moves_base_and_keeps_absolute_offsets() {
        let mut buffer = filled(b"0123456789");

        assert_eq!(buffer.trim_to(4), 4);
        assert_eq!(buffer.base(), 4);
        assert_eq!(buffer.tail(), 10);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.slice(4, 3), b"456");

        buffer.append(b"ab");
        assert_eq!(buffer.slice(8, 10), b"89ab");
    }

    #[test]
    fn test_trim_never_moves_backward_or_past_tail() {
        let mut buffer = filled(b"abcdef");

        assert_eq!(buffer.trim_to(3), 3);
        assert_eq!(buffer.trim_to(1), 0);
        assert_eq!(buffer.base(), 3);

        assert_eq!(buffer.trim_to(100), 3);
        assert_eq!(buffer.base(), 6);
        assert_eq!(buffer.len(), 0);
        assert!(buffer.slice(6, 4).is_empty());
    }

    #[test]
    #[should_panic(expected = "stale read")]
    fn test_stale_slice_fails_fast() {
        let mut buffer = filled(b"abcdef");
        buffer.trim_to(2);
        let _ = buffer.slice(1, 1);
    }

    #[test]
    #[should_panic(expected = "beyond fetched tail")]
    fn test_slice_past_tail_fails_fast() {
        let buffer = filled(b"abc");
        let _ = buffer.slice(4, 1);
    }
}
