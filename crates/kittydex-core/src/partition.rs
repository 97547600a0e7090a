//! Range partitioning of the record id space.
//!
//! The full interval `[start, end)` is split into `n` contiguous half-open
//! ranges, one per worker. All but the last have length
//! `floor((end - start) / n)`; the last absorbs the remainder.
//!
//! ```rust
//! use kittydex_core::partition::{partition, IdRange};
//!
//! let ranges = partition(1, 100_000, 4)?;
//! assert_eq!(ranges[0], IdRange::new(1, 25_000));
//! assert_eq!(ranges[1], IdRange::new(25_000, 49_999));
//! assert_eq!(ranges[3], IdRange::new(74_998, 100_000));
//! # Ok::<(), kittydex_core::Error>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, RecordId, Result};

/// Half-open interval `[start, end)` of record ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    /// First id in the range.
    pub start: u64,
    /// One past the last id in the range.
    pub end: u64,
}

impl IdRange {
    /// Create a range. `end < start` is normalised to an empty range at `start`.
    #[must_use]
    pub const fn new(start: u64, end: u64) -> Self {
        if end < start {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// Number of ids in the range.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range contains no ids.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether `id` falls inside the range.
    #[must_use]
    pub const fn contains(&self, id: u64) -> bool {
        self.start <= id && id < self.end
    }

    /// The tail of this range starting at `from`, clamped to the range bounds.
    #[must_use]
    pub fn resume_from(&self, from: u64) -> Self {
        Self::new(from.clamp(self.start, self.end), self.end)
    }

    /// Record ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + use<> {
        (self.start..self.end).map(RecordId)
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Split `[start, end)` into `n` contiguous ranges.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] when `n` is zero. An empty or inverted
/// interval is not an error: it yields `n` empty ranges so that every worker
/// does nothing.
pub fn partition(start: u64, end: u64, n: usize) -> Result<Vec<IdRange>> {
    if n == 0 {
        return Err(Error::InvalidConfig(
            "worker count must be at least 1".to_string(),
        ));
    }
    if end <= start {
        return Ok(vec![IdRange::new(start, start); n]);
    }

    let count = n as u64;
    let stride = (end - start) / count;
    let mut ranges = Vec::with_capacity(n);
    let mut curr = start;
    for _ in 1..count {
        ranges.push(IdRange::new(curr, curr + stride));
        curr += stride;
    }
    ranges.push(IdRange::new(curr, end));
    Ok(ranges)
}
