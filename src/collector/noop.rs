//! Fallback collector for platforms without a power notification binding.
//!
//! Nothing is captured automatically. Transitions can still be fed in through
//! [`NoopCollector::observer`] or the `curfew record` command, for example from
//! a systemd sleep hook.

use crate::collector::types::{ChannelObserver, CollectorError, Notification, CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A collector that never emits events on its own.
pub struct NoopCollector {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// An observer feeding this collector's channel.
    pub fn observer(&self) -> ChannelObserver {
        ChannelObserver::new(self.sender.clone())
    }

    pub fn receiver(&self) -> &Receiver<Notification> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl Default for NoopCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the notification source, for status output.
pub fn backend_name() -> &'static str {
    "manual (curfew record)"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::PowerObserver;
    use crate::journal::EventKind;

    #[test]
    fn test_lifecycle() {
        let mut collector = NoopCollector::new();
        assert!(!collector.is_running());

        collector.start().unwrap();
        assert!(collector.is_running());
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyRunning)
        ));

        collector.stop();
        assert!(!collector.is_running());
    }

    #[test]
    fn test_injected_events_reach_receiver() {
        let collector = NoopCollector::new();
        let mut observer = collector.observer();

        observer.on_sleep();

        let notification = collector.try_recv().unwrap();
        assert_eq!(notification.event.kind, EventKind::Sleep);
        assert!(collector.try_recv().is_none());
    }
}
