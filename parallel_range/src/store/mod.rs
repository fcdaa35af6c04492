//! Object-store clients.
//!
//! The reader only needs two calls from a store: the length of an object and a
//! byte stream for an inclusive range of it. Implementations must be safe to
//! share between fetch workers; a session holds its store behind an `Arc` and
//! releases it on close.

use std::io::Read;

use crate::error::StoreResult;

pub mod http;
pub mod local;
pub mod memory;

pub use http::HttpStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Metadata of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub length: u64,
}

/// Range-addressable, read-only object storage.
pub trait ObjectStore: Send + Sync {
    /// Looks up the object's length.
    fn metadata(&self, container: &str, key: &str) -> StoreResult<ObjectMetadata>;

    /// Opens a stream over bytes `start..=end` of the object.
    ///
    /// The stream should yield exactly `end - start + 1` bytes. Callers do not
    /// rely on a single `read` returning everything and treat a short stream as
    /// a failed request.
    fn get_range(
        &self,
        container: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StoreResult<Box<dyn Read + Send>>;
}
