//! The consumer-facing side of a read session.
//!
//! [`ParallelRangeReader`] owns the session's threads and hands out the
//! object's bytes in order. [`CompletionHandle`] lets another thread wait for
//! the session to finish.

use std::io::{self, Read};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::unbounded;
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::config::ReaderConfig;
use crate::error::{ReaderError, ReaderResult};
use crate::path::ObjectPath;
use crate::plan::plan_parts;
use crate::session::{SessionState, Shared};
use crate::store::ObjectStore;
use crate::worker::WorkerPool;

/// Sequential reader over a remote object, fetched as parallel range requests.
///
/// Opening the reader looks up the object's length, splits it into parts and
/// starts the fetch workers and the admission thread. Reads then return the
/// object's bytes strictly in order, blocking until the next part has arrived.
/// At most [`ReaderConfig::window_size`] parts are fetched ahead of the reader.
///
/// A part that cannot be fetched within the retry budget fails the whole
/// session: the next read (and every one after it) returns the error.
///
/// # Examples
///
/// ```
/// use std::io::Read;
/// use std::sync::Arc;
/// use parallel_range::{MemoryStore, ParallelRangeReader, ReaderConfig};
///
/// let store = MemoryStore::new();
/// store.insert("bucket", "hello.txt", b"hello, world".to_vec());
///
/// let config = ReaderConfig::new(4, 2)
///     .with_admission_interval(std::time::Duration::from_millis(1));
/// let mut reader = ParallelRangeReader::open(Arc::new(store), "s3://bucket/hello.txt", config)?;
/// let mut out = String::new();
/// reader.read_to_string(&mut out)?;
/// assert_eq!(out, "hello, world");
/// reader.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ParallelRangeReader {
    shared: Arc<Shared>,
    config: ReaderConfig,
    part_count: usize,
    store: Option<Arc<dyn ObjectStore>>,
    workers: Option<WorkerPool>,
    admission: Option<JoinHandle<()>>,
    /// Part currently being handed out and how much of it has been read.
    chunk: Vec<u8>,
    chunk_pos: usize,
    /// Bytes taken out of the cache so far.
    taken: u64,
    state: SessionState,
}

impl ParallelRangeReader {
    /// Opens `path` (`[scheme://]container/key`) on `store`.
    ///
    /// # Errors
    ///
    /// - [`ReaderError::Config`] for a malformed path or unusable settings.
    /// - [`ReaderError::Metadata`] if the object's length cannot be fetched.
    /// - [`ReaderError::Spawn`] if the session's threads cannot be started.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        path: &str,
        config: ReaderConfig,
    ) -> ReaderResult<Self> {
        config.validate()?;
        let object = ObjectPath::parse(path)?;
        Self::open_object(store, object, config)
    }

    /// Like [`open`](Self::open) with an already parsed path.
    pub fn open_object(
        store: Arc<dyn ObjectStore>,
        object: ObjectPath,
        config: ReaderConfig,
    ) -> ReaderResult<Self> {
        config.validate()?;

        let metadata = store
            .metadata(&object.container, &object.key)
            .map_err(|e| ReaderError::Metadata {
                container: object.container.clone(),
                key: object.key.clone(),
                source: Arc::new(e),
            })?;
        let parts = plan_parts(metadata.length, config.part_size)?;
        let part_count = parts.len();

        info!(
            object = %object,
            length = metadata.length,
            parts = part_count,
            part_size = config.part_size,
            parallelism = config.parallelism,
            window = config.window_size(),
            "opening read session"
        );

        let shared = Arc::new(Shared::new(object, metadata.length));
        let (in_flight_tx, in_flight_rx) = unbounded();

        let mut workers = WorkerPool::start(&shared, &store, &in_flight_rx, &config)?;
        drop(in_flight_rx);

        let admission = AdmissionController::new(
            parts,
            in_flight_tx,
            shared.clone(),
            config.window_size(),
            config.admission_interval,
        )
        .spawn();
        let admission = match admission {
            Ok(handle) => handle,
            Err(e) => {
                shared.shutdown.trigger();
                workers.join(config.join_timeout);
                return Err(ReaderError::Spawn(e.to_string()));
            }
        };

        Ok(Self {
            shared,
            config,
            part_count,
            store: Some(store),
            workers: Some(workers),
            admission: Some(admission),
            chunk: Vec::new(),
            chunk_pos: 0,
            taken: 0,
            state: SessionState::Open,
        })
    }

    /// Object length in bytes, as reported by the store.
    pub fn len(&self) -> u64 {
        self.shared.length
    }

    pub fn is_empty(&self) -> bool {
        self.shared.length == 0
    }

    pub fn object(&self) -> &ObjectPath {
        &self.shared.object
    }

    pub fn part_count(&self) -> usize {
        self.part_count
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes handed to the caller so far.
    pub fn delivered(&self) -> u64 {
        self.shared.delivered()
    }

    /// Most parts the cache has held at once.
    pub fn cache_high_water(&self) -> usize {
        self.shared.cache.high_water()
    }

    /// Copies the next bytes of the object into `buf`.
    ///
    /// Returns 0 only once the whole object has been delivered, and keeps
    /// returning 0 after that.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> ReaderResult<usize> {
        self.check_usable()?;
        if buf.is_empty() {
            return Ok(0);
        }

        if self.chunk_pos >= self.chunk.len() {
            if self.taken == self.shared.length {
                self.state = SessionState::Draining;
                return Ok(0);
            }
            self.chunk = self.next_part()?;
            self.chunk_pos = 0;
        }

        let len = buf.len().min(self.chunk.len() - self.chunk_pos);
        buf[..len].copy_from_slice(&self.chunk[self.chunk_pos..self.chunk_pos + len]);
        self.chunk_pos += len;
        self.shared.add_delivered(len as u64);
        Ok(len)
    }

    /// Reports the fatal error if one was recorded, or `Closed` after close.
    fn check_usable(&mut self) -> ReaderResult<()> {
        if let Some(err) = self.shared.fatal() {
            if self.state != SessionState::Closed {
                self.state = SessionState::Failed;
            }
            return Err(err);
        }
        if self.state == SessionState::Closed {
            return Err(ReaderError::Closed);
        }
        Ok(())
    }

    /// Blocks until the next part in offset order is available and takes it.
    fn next_part(&mut self) -> ReaderResult<Vec<u8>> {
        loop {
            self.check_usable()?;

            let ready = self
                .shared
                .cache
                .take_next_ready(self.config.drain_poll_interval);
            if let Some((offset, bytes)) = ready {
                debug_assert_eq!(offset, self.taken, "part taken out of order");
                self.taken += bytes.len() as u64;
                return Ok(bytes);
            }

            let exited = self.workers.as_ref().map_or(true, WorkerPool::all_exited);
            if exited && self.shared.fatal().is_none() {
                // A worker may have filled the slot just before returning.
                if let Some((_, bytes)) = self.shared.cache.take_next_ready(Duration::ZERO) {
                    self.taken += bytes.len() as u64;
                    return Ok(bytes);
                }
                return Err(ReaderError::Stalled {
                    delivered: self.shared.delivered(),
                    length: self.shared.length,
                });
            }
        }
    }

    /// Drives the session to the end without handing bytes to the caller.
    ///
    /// Drains and discards every remaining part, returning how many bytes were
    /// skipped, or the session's fatal error.
    pub fn wait_until_complete(&mut self) -> ReaderResult<u64> {
        let mut skipped = 0;
        loop {
            let rest = (self.chunk.len() - self.chunk_pos) as u64;
            if rest > 0 {
                self.chunk_pos = self.chunk.len();
                self.shared.add_delivered(rest);
                skipped += rest;
            }

            self.check_usable()?;
            if self.taken == self.shared.length {
                self.state = SessionState::Draining;
                return Ok(skipped);
            }

            self.chunk = self.next_part()?;
            self.chunk_pos = 0;
        }
    }

    /// Handle for waiting on this session from another thread.
    pub fn completion(&self) -> CompletionHandle {
        CompletionHandle {
            shared: self.shared.clone(),
            poll: self.config.drain_poll_interval,
        }
    }

    /// Stops the workers and the admission thread and releases the store.
    ///
    /// Safe to call more than once. Returns the session's fatal error if one
    /// was recorded, so a caller that only closes still learns the object was
    /// not read completely.
    pub fn close(&mut self) -> ReaderResult<()> {
        if self.state != SessionState::Closed {
            self.shared.shutdown.trigger();

            if let Some(handle) = self.admission.take() {
                if handle.join().is_err() {
                    warn!("admission thread panicked");
                }
            }
            if let Some(mut workers) = self.workers.take() {
                workers.join(self.config.join_timeout);
            }
            self.store = None;
            self.shared.cache.clear();
            self.chunk = Vec::new();
            self.chunk_pos = 0;

            debug!(object = %self.shared.object, "store released");
            info!(
                object = %self.shared.object,
                delivered = self.shared.delivered(),
                length = self.shared.length,
                "read session closed"
            );
            self.state = SessionState::Closed;
        }

        match self.shared.fatal() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Read for ParallelRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::from)
    }
}

impl Drop for ParallelRangeReader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Waits for a session to finish from a thread other than the reader's.
#[derive(Clone)]
pub struct CompletionHandle {
    shared: Arc<Shared>,
    poll: Duration,
}

impl CompletionHandle {
    /// Blocks until the reader has been handed the whole object or the session
    /// has failed.
    ///
    /// # Errors
    ///
    /// Returns the fatal error, or [`ReaderError::Closed`] if the session was
    /// closed before everything was delivered.
    pub fn wait(&self) -> ReaderResult<()> {
        loop {
            if let Some(err) = self.shared.fatal() {
                return Err(err);
            }
            if self.shared.delivered() >= self.shared.length {
                return Ok(());
            }
            if self.shared.shutdown.is_triggered() {
                return Err(ReaderError::Closed);
            }
            self.shared.cache.wait_for_change(self.poll);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shared.delivered() >= self.shared.length
    }
}
