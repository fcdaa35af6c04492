//! Parallel range reader for immutable objects in range-addressable storage.
//!
//! [`ParallelRangeReader`] presents a remote object as an ordinary
//! [`std::io::Read`] stream while fetching it as many concurrent range
//! requests. The pipeline has four stages:
//!
//! 1. **Planning**: the object is split into fixed-size ranges ([`plan_parts`]).
//! 2. **Admission**: a ticking thread moves ranges into flight while the
//!    lookahead window has room, reserving a cache slot for each.
//! 3. **Fetching**: a pool of workers downloads admitted ranges, retrying
//!    failed requests with exponential backoff.
//! 4. **Reassembly**: the reader takes finished parts from the cache strictly by
//!    ascending offset, so completion order never shows in the output.
//!
//! The window bounds memory use: at most `window` parts are reserved, in
//! flight, or fetched but not yet read at any time.

pub mod cache;
pub mod config;
pub mod error;
pub mod path;
pub mod plan;
pub mod reader;
pub mod store;

mod admission;
mod session;
mod shutdown;
mod worker;

pub use config::ReaderConfig;
pub use error::{FetchFailure, ReaderError, ReaderResult, StoreError, StoreResult};
pub use path::ObjectPath;
pub use plan::{plan_parts, RangeDescriptor};
pub use reader::{CompletionHandle, ParallelRangeReader};
pub use session::SessionState;
pub use store::{HttpStore, LocalStore, MemoryStore, ObjectMetadata, ObjectStore};
