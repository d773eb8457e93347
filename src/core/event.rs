//! Reload-completed notifications.
//!
//! The coordinator publishes one event per successful cycle; subscribers
//! (the watch loop, host integration, tests) receive it over a crossbeam
//! channel. Dead subscribers are pruned on publish.

use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// How a cycle took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// Method bodies were replaced in the live generation.
    Redefined,
    /// A new generation superseded the old one.
    Swapped,
}

/// Published after a reload cycle completes successfully.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub kind: ReloadKind,
    /// Affected class names, sorted.
    pub classes: Vec<String>,
    /// Generation serving after the cycle.
    pub generation: u64,
}

/// Subscriber registry for reload events.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<ReloadEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber; the receiver sees every later event.
    pub fn subscribe(&self) -> Receiver<ReloadEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send an event to all live subscribers, dropping closed channels.
    pub fn publish(&self, event: &ReloadEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
