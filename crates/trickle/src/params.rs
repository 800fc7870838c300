use crate::{Error, Result};

/// Chunk size used by `GET /`: 100 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024;

/// Chunk count used whenever the path does not name one.
pub const DEFAULT_CHUNK_COUNT: usize = 10_000;

/// Unit suffix applied to a requested chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Multiplier {
    /// No suffix, `B` or `b`.
    Bytes,
    /// `K` or `k`.
    Kibi,
    /// `M` or `m`.
    Mebi,
}

impl Multiplier {
    /// Parses a unit suffix. Returns `None` for anything but the empty string
    /// and `B`, `b`, `K`, `k`, `M`, `m`.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "" | "B" | "b" => Some(Self::Bytes),
            "K" | "k" => Some(Self::Kibi),
            "M" | "m" => Some(Self::Mebi),
            _ => None,
        }
    }

    pub const fn factor(self) -> usize {
        match self {
            Self::Bytes => 1,
            Self::Kibi => 1024,
            Self::Mebi => 1024 * 1024,
        }
    }
}

/// Stream parameters resolved from a request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamParams {
    /// Bytes per chunk, after applying the unit multiplier.
    pub chunk_size: usize,
    /// Number of chunks to stream.
    pub chunk_count: usize,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_count: DEFAULT_CHUNK_COUNT,
        }
    }
}

/// Server-side upper bounds on what a single request may ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLimits {
    pub max_chunk_size: usize,
    pub max_chunk_count: usize,
}

impl Default for StreamLimits {
    fn default() -> Self {
        Self {
            max_chunk_size: 64 * 1024 * 1024,
            max_chunk_count: 1_000_000,
        }
    }
}

impl StreamParams {
    /// Rejects parameters that exceed `limits`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the chunk size or chunk count is
    /// above its limit.
    pub fn check(&self, limits: &StreamLimits) -> Result<()> {
        if self.chunk_size > limits.max_chunk_size {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Chunk size {} exceeds maximum allowed ({})",
                    self.chunk_size, limits.max_chunk_size
                ),
            });
        }
        if self.chunk_count > limits.max_chunk_count {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Chunk count {} exceeds maximum allowed ({})",
                    self.chunk_count, limits.max_chunk_count
                ),
            });
        }
        Ok(())
    }
}

/// Resolves a request path into [`StreamParams`].
///
/// Recognized shapes:
///
/// - `/` - default chunk size and count.
/// - `/{value}{multiplier}` - chunk size `value * multiplier`, default count.
/// - `/{value}{multiplier}/{count}` - same, with an explicit count.
///
/// `value` and `count` are decimal digits; `multiplier` is empty or one of
/// `B`, `b`, `K`, `k`, `M`, `m`.
///
/// # Errors
///
/// - [`Error::UnmatchedPath`] if the path has none of the shapes above.
/// - [`Error::InvalidRequest`] if the chunk size or count resolves to zero or
///   does not fit in a `usize`.
///
/// # Example
///
/// ```
/// use trickle::{resolve, Error};
///
/// assert_eq!(resolve("/2M").unwrap().chunk_size, 2 * 1024 * 1024);
/// assert!(matches!(resolve("/100/0"), Err(Error::InvalidRequest { .. })));
/// ```
pub fn resolve(path: &str) -> Result<StreamParams> {
    let unmatched = || Error::UnmatchedPath {
        path: path.to_string(),
    };

    let rest = path.strip_prefix('/').ok_or_else(unmatched)?;
    if rest.is_empty() {
        return Ok(StreamParams::default());
    }

    let (size_segment, count_segment) = match rest.split_once('/') {
        Some((size, count)) => (size, Some(count)),
        None => (rest, None),
    };

    let digits_end = size_segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(size_segment.len());
    let (value, suffix) = size_segment.split_at(digits_end);
    if value.is_empty() {
        return Err(unmatched());
    }
    let multiplier = Multiplier::from_suffix(suffix).ok_or_else(unmatched)?;

    let chunk_count = match count_segment {
        None => DEFAULT_CHUNK_COUNT,
        Some(count) if is_decimal(count) => parse_decimal(count, "chunk count")?,
        Some(_) => return Err(unmatched()),
    };

    let chunk_size = parse_decimal(value, "chunk size")?
        .checked_mul(multiplier.factor())
        .ok_or_else(|| Error::InvalidRequest {
            reason: format!("Chunk size {size_segment} overflows"),
        })?;

    if chunk_size == 0 {
        return Err(Error::InvalidRequest {
            reason: "Chunk size must be greater than 0".to_string(),
        });
    }
    if chunk_count == 0 {
        return Err(Error::InvalidRequest {
            reason: "Chunk count must be greater than 0".to_string(),
        });
    }

    Ok(StreamParams {
        chunk_size,
        chunk_count,
    })
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_decimal(digits: &str, what: &str) -> Result<usize> {
    digits.parse().map_err(|_| Error::InvalidRequest {
        reason: format!("The {what} `{digits}` is out of range"),
    })
}
