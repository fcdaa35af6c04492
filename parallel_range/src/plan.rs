//! Splitting an object into byte ranges.

use crate::error::{ReaderError, ReaderResult};

/// An inclusive byte range of the object being read.
///
/// The object itself is identified by the session that owns the descriptor;
/// every descriptor of a session refers to the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeDescriptor {
    /// First byte offset of the range.
    pub start: u64,
    /// Last byte offset of the range (inclusive).
    pub end: u64,
}

impl RangeDescriptor {
    /// Number of bytes the range covers.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: a planned range holds at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Splits `[0, length)` into consecutive ranges of `part_size` bytes.
///
/// The last range is shorter when `length` is not a multiple of `part_size`.
/// An empty object yields no ranges.
///
/// # Errors
///
/// Returns [`ReaderError::Config`] if `part_size` is zero.
pub fn plan_parts(length: u64, part_size: u64) -> ReaderResult<Vec<RangeDescriptor>> {
    if part_size == 0 {
        return Err(ReaderError::Config("part size must be greater than zero".into()));
    }

    let count = length.div_ceil(part_size);
    let mut parts = Vec::with_capacity(count as usize);
    let mut position = 0;
    while position < length {
        let len = part_size.min(length - position);
        parts.push(RangeDescriptor {
            start: position,
            end: position + len - 1,
        });
        position += len;
    }

    Ok(parts)
}
