//! One-shot stop signal shared by a session's threads.
//!
//! The signal is a channel that never carries a message: triggering it drops
//! the only sender, after which every receive on it returns immediately. That
//! lets the admission thread `select!` on it next to its ticker, and lets
//! workers use it as an interruptible sleep between retries.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

#[derive(Debug)]
pub(crate) struct Shutdown {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Fires the signal. Later calls do nothing.
    pub(crate) fn trigger(&self) {
        self.sender.lock().take();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) once the signal fires.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }

    /// Sleeps for `duration` unless the signal fires first.
    ///
    /// Returns true if the sleep was cut short by the signal.
    pub(crate) fn sleep(&self, duration: Duration) -> bool {
        matches!(
            self.receiver.recv_timeout(duration),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger_is_sticky() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert!(!shutdown.sleep(Duration::from_millis(1)));

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(shutdown.sleep(Duration::from_secs(60)));
    }

    #[test]
    fn test_trigger_interrupts_sleep() {
        let shutdown = Arc::new(Shutdown::new());
        let sleeper = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let interrupted = shutdown.sleep(Duration::from_secs(30));
                (interrupted, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        let (interrupted, elapsed) = sleeper.join().unwrap();
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(10));
    }
}
