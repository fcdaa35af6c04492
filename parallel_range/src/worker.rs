//! Fetch workers.
//!
//! Each worker takes admitted ranges off the shared work queue, downloads the
//! whole range in one request and stores the bytes in the part cache. Failed
//! attempts are retried with exponential backoff; a range that still fails
//! after the retry budget ends the session.

use std::any::Any;
use std::io::{ErrorKind, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace, warn};

use crate::config::ReaderConfig;
use crate::error::{FetchFailure, ReaderError, ReaderResult, StoreError, StoreResult};
use crate::plan::RangeDescriptor;
use crate::session::Shared;
use crate::store::ObjectStore;

enum FetchError {
    /// The session shut down between attempts.
    Interrupted,
    Failed(FetchFailure),
}

pub(crate) struct FetchWorker {
    id: usize,
    shared: Arc<Shared>,
    store: Arc<dyn ObjectStore>,
    in_flight: Receiver<RangeDescriptor>,
    config: ReaderConfig,
}

impl FetchWorker {
    fn run(self) {
        trace!(worker = self.id, "fetch worker started");
        loop {
            if self.shared.shutdown.is_triggered() {
                break;
            }
            let range = match self.in_flight.recv_timeout(self.config.worker_poll_interval) {
                Ok(range) => range,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match self.fetch_with_retry(range) {
                Ok(bytes) => self.shared.cache.fill(range.start, bytes),
                Err(FetchError::Interrupted) => break,
                Err(FetchError::Failed(failure)) => {
                    self.shared.fail(ReaderError::Fatal(Arc::new(failure)));
                    break;
                }
            }
        }
        trace!(worker = self.id, "fetch worker exiting");
    }

    fn fetch_with_retry(&self, range: RangeDescriptor) -> Result<Vec<u8>, FetchError> {
        let mut failures = 0;
        loop {
            let started = Instant::now();
            match self.fetch_once(range) {
                Ok(bytes) => {
                    debug!(
                        worker = self.id,
                        start = range.start,
                        end = range.end,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "part fetched"
                    );
                    return Ok(bytes);
                }
                Err(err) => {
                    failures += 1;
                    if !err.is_retryable() || failures > self.config.retry_budget {
                        return Err(FetchError::Failed(FetchFailure {
                            range,
                            attempts: failures,
                            source: err,
                        }));
                    }

                    let delay = self.config.backoff_delay(failures);
                    warn!(
                        worker = self.id,
                        start = range.start,
                        end = range.end,
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "range fetch failed, retrying"
                    );
                    if self.shared.shutdown.sleep(delay) {
                        return Err(FetchError::Interrupted);
                    }
                }
            }
        }
    }

    /// One request for the whole range. Short bodies count as failures.
    fn fetch_once(&self, range: RangeDescriptor) -> StoreResult<Vec<u8>> {
        let expected = usize::try_from(range.len()).map_err(|_| {
            StoreError::Transport(format!("part of {} bytes does not fit in memory", range.len()))
        })?;
        let object = &self.shared.object;
        let mut body = self
            .store
            .get_range(&object.container, &object.key, range.start, range.end)?;

        let mut buf = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            match body.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < expected {
            return Err(StoreError::Truncated {
                expected: expected as u64,
                actual: filled as u64,
            });
        }
        Ok(buf)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The session's fetch workers, each on its own thread of a dedicated pool.
pub(crate) struct WorkerPool {
    pool: Option<ThreadPool>,
    /// Disconnects once every worker has returned.
    done: Receiver<()>,
    size: usize,
}

impl WorkerPool {
    pub(crate) fn start(
        shared: &Arc<Shared>,
        store: &Arc<dyn ObjectStore>,
        in_flight: &Receiver<RangeDescriptor>,
        config: &ReaderConfig,
    ) -> ReaderResult<Self> {
        let size = config.parallelism;
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("range-fetch-{i}"))
            .build()
            .map_err(|e| ReaderError::Spawn(e.to_string()))?;

        let (done_tx, done_rx) = bounded::<()>(0);
        for id in 0..size {
            let worker = FetchWorker {
                id,
                shared: shared.clone(),
                store: store.clone(),
                in_flight: in_flight.clone(),
                config: config.clone(),
            };
            let done = done_tx.clone();
            let shared = shared.clone();
            // A panic escaping a rayon job aborts the process.
            pool.spawn(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                    shared.fail(ReaderError::WorkerPanicked {
                        worker: id,
                        message: panic_message(payload.as_ref()),
                    });
                }
                drop(done);
            });
        }

        Ok(Self {
            pool: Some(pool),
            done: done_rx,
            size,
        })
    }

    pub(crate) fn all_exited(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Waits up to `timeout` for every worker to return.
    ///
    /// Workers only look at the stop signal between requests, so one stuck in
    /// a slow request may outlive the timeout. Its pool is released anyway; the
    /// thread exits on its own once the request returns.
    pub(crate) fn join(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let joined = loop {
            match self.done.recv_deadline(deadline) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Disconnected) => break true,
                Err(RecvTimeoutError::Timeout) => break false,
            }
        };
        if !joined {
            warn!(
                workers = self.size,
                timeout_ms = timeout.as_millis() as u64,
                "fetch workers did not stop in time, detaching"
            );
        }
        self.pool.take();
        joined
    }
}
