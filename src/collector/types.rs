//! Observer interface between platform power notifications and the journal.
//!
//! Platform callbacks only ever need to say "this kind of transition happened
//! now". They do that through [`PowerObserver`], and the collectors hand the
//! events over a bounded channel so the journal sees one append at a time.

use crate::journal::{Event, EventKind};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Capacity of the channel between platform callbacks and the recorder.
pub const CHANNEL_CAPACITY: usize = 256;

/// How long a collector thread gets to report whether registration worked.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Something that reacts to power and lifecycle transitions.
pub trait PowerObserver {
    /// Handle one transition.
    fn observe(&mut self, event: Event);

    fn on_sleep(&mut self) {
        self.observe(Event::now(EventKind::Sleep));
    }

    fn on_wake(&mut self) {
        self.observe(Event::now(EventKind::Wake));
    }

    fn on_power_off(&mut self) {
        self.observe(Event::now(EventKind::PowerOff));
    }

    fn on_app_start(&mut self) {
        self.observe(Event::now(EventKind::AppStart));
    }

    fn on_app_close(&mut self) {
        self.observe(Event::now(EventKind::AppClose));
    }
}

/// An event travelling from a platform callback to the recorder.
///
/// When the sender is waiting for the event to be journaled it attaches an
/// acknowledgement channel, which [`Notification::deliver`] signals.
#[derive(Debug)]
pub struct Notification {
    pub event: Event,
    ack: Option<Sender<()>>,
}

impl Notification {
    pub fn new(event: Event) -> Self {
        Self { event, ack: None }
    }

    /// Hand the event to `observer`, then release anyone waiting on it.
    pub fn deliver<O: PowerObserver + ?Sized>(self, observer: &mut O) {
        observer.observe(self.event);
        if let Some(ack) = self.ack {
            let _ = ack.try_send(());
        }
    }
}

/// Forwards observed transitions into a channel without blocking.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<Notification>,
    dropped: u64,
}

impl ChannelObserver {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Events that could not be queued because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue `event` and wait until it has been delivered, for callbacks
    /// after which the OS may end the process.
    ///
    /// Returns `false` if delivery was not confirmed within `timeout`.
    pub fn observe_confirmed(&mut self, event: Event, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (ack_tx, ack_rx) = bounded(1);
        let notification = Notification {
            event,
            ack: Some(ack_tx),
        };

        if self.sender.send_timeout(notification, timeout).is_err() {
            self.dropped += 1;
            return false;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        ack_rx.recv_timeout(remaining).is_ok()
    }
}

impl PowerObserver for ChannelObserver {
    fn observe(&mut self, event: Event) {
        // Platform callbacks must return promptly, so never block here.
        if self.sender.try_send(Notification::new(event)).is_err() {
            self.dropped += 1;
        }
    }
}

/// Errors that can occur while collecting power notifications.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Failed to register for power notifications: {0}")]
    RegistrationFailed(String),
}

/// Channel a collector thread uses to report the outcome of registration.
pub type RegistrationReport = Sender<Result<(), CollectorError>>;

/// Wait for a collector thread to report whether it registered with the OS.
pub fn wait_for_registration(
    ready: &Receiver<Result<(), CollectorError>>,
    timeout: Duration,
) -> Result<(), CollectorError> {
    match ready.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(CollectorError::RegistrationFailed(
            "no answer from the notification thread".to_string(),
        )),
        Err(RecvTimeoutError::Disconnected) => Err(CollectorError::RegistrationFailed(
            "notification thread exited before registering".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Default)]
    struct Collected(Vec<EventKind>);

    impl PowerObserver for Collected {
        fn observe(&mut self, event: Event) {
            self.0.push(event.kind);
        }
    }

    #[test]
    fn test_channel_observer_forwards_kinds() {
        let (sender, receiver) = bounded(8);
        let mut observer = ChannelObserver::new(sender);

        observer.on_sleep();
        observer.on_wake();
        observer.on_power_off();

        let kinds: Vec<EventKind> = receiver.try_iter().map(|n| n.event.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Sleep, EventKind::Wake, EventKind::PowerOff]
        );
        assert_eq!(observer.dropped(), 0);
    }

    #[test]
    fn test_channel_observer_counts_overflow() {
        let (sender, receiver) = bounded(1);
        let mut observer = ChannelObserver::new(sender);

        observer.on_app_start();
        observer.on_app_close();

        assert_eq!(receiver.len(), 1);
        assert_eq!(observer.dropped(), 1);
    }

    #[test]
    fn test_confirmed_observe_waits_for_delivery() {
        let (sender, receiver) = bounded(8);
        let mut observer = ChannelObserver::new(sender);

        let consumer = thread::spawn(move || {
            let mut collected = Collected::default();
            let notification = receiver.recv().unwrap();
            notification.deliver(&mut collected);
            collected.0
        });

        let confirmed =
            observer.observe_confirmed(Event::now(EventKind::PowerOff), Duration::from_secs(5));

        assert!(confirmed);
        assert_eq!(consumer.join().unwrap(), vec![EventKind::PowerOff]);
    }

    #[test]
    fn test_confirmed_observe_times_out_without_consumer() {
        let (sender, _receiver) = bounded(8);
        let mut observer = ChannelObserver::new(sender);

        let confirmed =
            observer.observe_confirmed(Event::now(EventKind::PowerOff), Duration::from_millis(50));

        assert!(!confirmed);
    }

    #[test]
    fn test_plain_delivery_has_no_ack() {
        let mut collected = Collected::default();
        Notification::new(Event::now(EventKind::Wake)).deliver(&mut collected);
        assert_eq!(collected.0, vec![EventKind::Wake]);
    }

    #[test]
    fn test_registration_outcomes() {
        let (ready_tx, ready_rx) = bounded(1);
        ready_tx.send(Ok(())).unwrap();
        assert!(wait_for_registration(&ready_rx, Duration::from_secs(1)).is_ok());

        ready_tx
            .send(Err(CollectorError::RegistrationFailed("denied".to_string())))
            .unwrap();
        match wait_for_registration(&ready_rx, Duration::from_secs(1)) {
            Err(CollectorError::RegistrationFailed(reason)) => assert_eq!(reason, "denied"),
            other => panic!("expected RegistrationFailed, got {other:?}"),
        }

        assert!(wait_for_registration(&ready_rx, Duration::from_millis(20)).is_err());

        drop(ready_tx);
        assert!(matches!(
            wait_for_registration(&ready_rx, Duration::from_secs(1)),
            Err(CollectorError::RegistrationFailed(_))
        ));
    }
}
