//! Size-bounded write buffer emitting length-prefixed frames.

use crate::error::{ProtocolError, Result};

/// Width in bytes of the length-prefix placeholder reserved by [`FramedOutputBuffer::new`].
const LENGTH_PREFIX_LEN: usize = 4;

/// A write-only buffer parameterized by a byte limit. `limit == 0` means
/// unlimited.
///
/// A freshly constructed buffer reserves four bytes up front as a
/// length-prefix placeholder. [`finish`](Self::finish) overwrites those
/// same four bytes in place with the big-endian length of everything
/// written after them, so the wire frame is `[len][body]` rather than a
/// new length field prepended in front of the placeholder. A buffer on
/// which nothing was ever written beyond the placeholder frames as the
/// canonical oneway/empty-reply marker: a declared length of zero.
#[derive(Debug)]
pub struct FramedOutputBuffer {
    limit: usize,
    body: Vec<u8>,
}

impl FramedOutputBuffer {
    /// Construct a buffer bounded by `limit` bytes (0 = unbounded).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            body: vec![0u8; LENGTH_PREFIX_LEN],
        }
    }

    /// Current accumulated body size, including the reserved length prefix.
    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether nothing has been written beyond the reserved length prefix.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.len() == LENGTH_PREFIX_LEN
    }

    /// Append `chunk` to the buffer. Fails without committing any bytes if
    /// doing so would exceed the configured limit.
    pub fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let prospective = self.body.len() + chunk.len();
        if self.limit != 0 && prospective > self.limit {
            return Err(ProtocolError::MessageTooLarge {
                size: prospective,
                limit: self.limit,
            });
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    /// Finish the buffer, overwriting the reserved length prefix in place
    /// with the big-endian length of everything written after it.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let content_len = (self.body.len() - LENGTH_PREFIX_LEN) as u32;
        self.body[..LENGTH_PREFIX_LEN].copy_from_slice(&content_len.to_be_bytes());
        self.body
    }

    /// Whether nothing has been written beyond the reserved length prefix
    /// (used by servers to suppress replies to oneway calls).
    #[must_use]
    pub fn is_oneway_sentinel(&self) -> bool {
        self.body.len() == LENGTH_PREFIX_LEN
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_the_sentinel() {
        let buf = FramedOutputBuffer::new(0);
        assert!(buf.is_oneway_sentinel());
    }

    #[test]
    fn finish_prefixes_length() {
        let mut buf = FramedOutputBuffer::new(0);
        buf.write(b"hello").unwrap();
        let framed = buf.finish();
        let len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, 5);
        assert_eq!(&framed[4..], b"hello");
    }

    #[test]
    fn rejects_writes_past_limit() {
        let mut buf = FramedOutputBuffer::new(6);
        let err = buf.write(b"abc").unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn limit_zero_is_unbounded() {
        let mut buf = FramedOutputBuffer::new(0);
        buf.write(&vec![0u8; 1 << 20]).unwrap();
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn framing_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut buf = FramedOutputBuffer::new(0);
            buf.write(&payload).unwrap();
            let framed = buf.finish();
            let len = u32::from_be_bytes(framed[0..4].try_into().unwrap()) as usize;
            prop_assert_eq!(len, framed.len() - 4);
            prop_assert_eq!(&framed[4..], &payload[..]);
        }
    }
}
