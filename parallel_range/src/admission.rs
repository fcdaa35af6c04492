//! Lookahead admission.
//!
//! Planned ranges wait in a pending queue owned by the admission thread. On
//! every tick, if the cache holds fewer entries than the lookahead window, the
//! next range gets an empty cache slot and is queued for the fetch workers.
//! The thread ends once the pending queue is empty, closing the work queue so
//! idle workers can exit after the last range.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, Sender};
use tracing::{debug, trace};

use crate::plan::RangeDescriptor;
use crate::session::Shared;

pub(crate) struct AdmissionController {
    pending: VecDeque<RangeDescriptor>,
    in_flight: Sender<RangeDescriptor>,
    shared: Arc<Shared>,
    window: usize,
    interval: Duration,
}

impl AdmissionController {
    pub(crate) fn new(
        parts: Vec<RangeDescriptor>,
        in_flight: Sender<RangeDescriptor>,
        shared: Arc<Shared>,
        window: usize,
        interval: Duration,
    ) -> Self {
        Self {
            pending: parts.into(),
            in_flight,
            shared,
            window,
            interval,
        }
    }

    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("range-admission".into())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        let ticker = tick(self.interval);
        let stop = self.shared.shutdown.receiver().clone();

        while !self.pending.is_empty() {
            select! {
                recv(ticker) -> _ => {
                    self.admit_one();
                }
                recv(stop) -> _ => {
                    debug!(remaining = self.pending.len(), "admission stopped");
                    return;
                }
            }
        }
        debug!("all ranges admitted");
    }

    /// Moves the next pending range into flight if the window has room.
    ///
    /// Returns true if a range was admitted.
    pub(crate) fn admit_one(&mut self) -> bool {
        let Some(&range) = self.pending.front() else {
            return false;
        };
        if !self.shared.cache.try_reserve(range.start, self.window) {
            trace!(window = self.window, "lookahead window full");
            return false;
        }
        self.pending.pop_front();

        if self.in_flight.send(range).is_err() {
            // Every worker is gone; nothing will ever fill the slot.
            self.pending.clear();
            return false;
        }
        trace!(start = range.start, end = range.end, "range admitted");
        true
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ObjectPath;
    use crate::plan::plan_parts;
    use crossbeam_channel::unbounded;

    fn shared(length: u64) -> Arc<Shared> {
        Arc::new(Shared::new(ObjectPath::parse("bucket/key").unwrap(), length))
    }

    #[test]
    fn test_admits_in_order_up_to_window() {
        let shared = shared(100);
        let (tx, rx) = unbounded();
        let parts = plan_parts(100, 10).unwrap();
        let mut admission =
            AdmissionController::new(parts, tx, shared.clone(), 3, Duration::from_millis(1));

        assert!(admission.admit_one());
        assert!(admission.admit_one());
        assert!(admission.admit_one());
        assert!(!admission.admit_one());
        assert_eq!(shared.cache.len(), 3);
        assert_eq!(admission.pending(), 7);

        let starts: Vec<u64> = rx.try_iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 10, 20]);

        // Consuming the head frees one slot.
        shared.cache.fill(0, vec![0; 10]);
        shared.cache.take_next_ready(Duration::ZERO).unwrap();
        assert!(admission.admit_one());
        assert_eq!(rx.try_recv().unwrap().start, 30);
    }

    #[test]
    fn test_thread_admits_everything_and_closes_queue() {
        let shared = shared(50);
        let (tx, rx) = unbounded();
        let parts = plan_parts(50, 10).unwrap();
        let interval = Duration::from_millis(1);
        let handle = AdmissionController::new(parts, tx, shared.clone(), 10, interval)
            .spawn()
            .unwrap();

        let starts: Vec<u64> = rx.iter().map(|r| r.start).collect();
        handle.join().unwrap();
        assert_eq!(starts, vec![0, 10, 20, 30, 40]);
        assert_eq!(shared.cache.len(), 5);
    }

    #[test]
    fn test_thread_stops_on_shutdown() {
        let shared = shared(50);
        let (tx, rx) = unbounded();
        let parts = plan_parts(50, 10).unwrap();
        // Window of one and nobody consuming: admission stalls after the first range.
        let interval = Duration::from_millis(1);
        let handle = AdmissionController::new(parts, tx, shared.clone(), 1, interval)
            .spawn()
            .unwrap();

        assert_eq!(rx.recv().unwrap().start, 0);
        shared.shutdown.trigger();
        handle.join().unwrap();
        assert!(rx.recv().is_err());
        assert_eq!(shared.cache.len(), 1);
    }
}
