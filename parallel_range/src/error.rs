//! Error types for the parallel range reader.
//!
//! Two layers of failure are kept apart:
//!
//! - [`StoreError`] is what a single object-store call can return. Range fetch
//!   failures of this kind are handled inside the fetch workers.
//! - [`ReaderError`] is what the reader session surfaces to its caller. A worker
//!   that gives up on a range turns its last [`StoreError`] into a
//!   [`ReaderError::Fatal`], which is then reported by every later call.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::plan::RangeDescriptor;

/// Result alias for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for reader session operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Failure of a single object-store request.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("access denied: {container}/{key}: {message}")]
    AccessDenied {
        container: String,
        key: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    /// The response body ended before the requested byte count was read.
    #[error("truncated response: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    /// Whether another attempt at the same request can be expected to succeed.
    ///
    /// Missing objects and permission failures are permanent; everything on the
    /// transport side (network, short bodies, local I/O) is worth retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StoreError::NotFound { .. } | StoreError::AccessDenied { .. }
        )
    }
}

/// A range fetch that exhausted its retry budget.
#[derive(Error, Debug)]
#[error("failed to fetch bytes {}..={} after {attempts} attempt(s)", range.start, range.end)]
pub struct FetchFailure {
    pub range: RangeDescriptor,
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

/// Errors surfaced by a reader session.
#[derive(Error, Debug, Clone)]
pub enum ReaderError {
    /// Malformed object path or unusable reader settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// The object's metadata could not be fetched while opening the session.
    #[error("metadata request for {container}/{key} failed")]
    Metadata {
        container: String,
        key: String,
        #[source]
        source: Arc<StoreError>,
    },

    /// A fetch worker gave up on a range; the session can no longer complete.
    #[error(transparent)]
    Fatal(Arc<FetchFailure>),

    /// Worker or admission threads could not be started.
    #[error("failed to start reader threads: {0}")]
    Spawn(String),

    /// A fetch worker panicked, usually inside the object store.
    #[error("fetch worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    /// Every fetch worker exited while parts were still missing.
    #[error("fetch workers stopped after {delivered} of {length} bytes")]
    Stalled { delivered: u64, length: u64 },

    /// The session was closed before the call.
    #[error("reader is closed")]
    Closed,
}

impl From<ReaderError> for io::Error {
    fn from(err: ReaderError) -> Self {
        let kind = match &err {
            ReaderError::Config(_) => io::ErrorKind::InvalidInput,
            ReaderError::Metadata { source, .. } => match source.as_ref() {
                StoreError::NotFound { .. } => io::ErrorKind::NotFound,
                StoreError::AccessDenied { .. } => io::ErrorKind::PermissionDenied,
                _ => io::ErrorKind::Other,
            },
            ReaderError::Fatal(_)
            | ReaderError::Spawn(_)
            | ReaderError::WorkerPanicked { .. } => io::ErrorKind::Other,
            ReaderError::Stalled { .. } => io::ErrorKind::UnexpectedEof,
            ReaderError::Closed => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}
