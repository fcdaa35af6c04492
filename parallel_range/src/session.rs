//! State shared between a reader, its admission thread and its fetch workers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tracing::error;

use crate::cache::PartCache;
use crate::error::ReaderError;
use crate::path::ObjectPath;
use crate::shutdown::Shutdown;

/// Lifecycle of a reader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Parts are being fetched and delivered.
    Open,
    /// Every byte has been delivered; reads return 0.
    Draining,
    /// A fetch failed for good; every read reports the failure.
    Failed,
    /// Workers are stopped and the store released.
    Closed,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) object: ObjectPath,
    pub(crate) length: u64,
    pub(crate) cache: PartCache,
    pub(crate) shutdown: Shutdown,
    /// Bytes handed to the consumer so far.
    delivered: AtomicU64,
    /// First unrecoverable error; later ones are dropped.
    fatal: OnceLock<ReaderError>,
}

impl Shared {
    pub(crate) fn new(object: ObjectPath, length: u64) -> Self {
        Self {
            object,
            length,
            cache: PartCache::new(),
            shutdown: Shutdown::new(),
            delivered: AtomicU64::new(0),
            fatal: OnceLock::new(),
        }
    }

    pub(crate) fn fatal(&self) -> Option<ReaderError> {
        self.fatal.get().cloned()
    }

    /// Records `err` as the session's fatal error unless one is already set,
    /// then stops the session and wakes anyone waiting on the cache.
    pub(crate) fn fail(&self, err: ReaderError) {
        match self.fatal.set(err) {
            Ok(()) => {
                if let Some(err) = self.fatal.get() {
                    error!(object = %self.object, error = %err, "read session failed");
                }
            }
            Err(later) => {
                tracing::debug!(error = %later, "dropping error after session already failed");
            }
        }
        self.shutdown.trigger();
        self.cache.wake_all();
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub(crate) fn add_delivered(&self, bytes: u64) {
        self.delivered.fetch_add(bytes, Ordering::AcqRel);
    }
}
