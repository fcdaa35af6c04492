//! objhash - digest of objects in range-addressable storage.
//!
//! The binary streams an object through [`parallel_range::ParallelRangeReader`]
//! and hashes it as it arrives; this library half holds the digest driver and
//! the progress display so they can be tested on their own.

pub mod digest;
pub mod progress;
