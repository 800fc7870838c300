use bytes::{BufMut, Bytes, BytesMut};

/// The repeating symbol cycle every chunk is built from.
pub const SYMBOLS: &[u8; 10] = b"123456789_";

/// Builds a chunk of exactly `len` bytes from the [`SYMBOLS`] cycle.
///
/// The cycle always restarts at its first symbol and the last repetition is
/// truncated to hit `len`. A fresh buffer is built on every call so that the
/// cost of producing a chunk stays inside the paced loop.
///
/// # Example
///
/// ```
/// use trickle::make_chunk;
///
/// assert_eq!(&make_chunk(12)[..], b"123456789_12");
/// assert!(make_chunk(0).is_empty());
/// ```
pub fn make_chunk(len: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(len);
    let mut left = len;
    while left > 0 {
        let take = left.min(SYMBOLS.len());
        buf.put_slice(&SYMBOLS[..take]);
        left -= take;
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chunk() {
        assert!(make_chunk(0).is_empty());
    }

    #[test]
    fn truncates_the_cycle() {
        assert_eq!(&make_chunk(1)[..], b"1");
        assert_eq!(&make_chunk(9)[..], b"123456789");
        assert_eq!(&make_chunk(10)[..], b"123456789_");
        assert_eq!(&make_chunk(23)[..], b"123456789_123456789_123");
    }

    #[test]
    fn every_byte_follows_the_cycle() {
        for len in [0, 7, 100, 1024, 102_400, 100_003] {
            let chunk = make_chunk(len);
            assert_eq!(chunk.len(), len);
            for (i, b) in chunk.iter().enumerate() {
                assert_eq!(*b, SYMBOLS[i % SYMBOLS.len()], "len {len}, index {i}");
            }
        }
    }

    #[test]
    fn regeneration_is_identical() {
        assert_eq!(make_chunk(4099), make_chunk(4099));
    }
}
