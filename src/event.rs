use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::ErrorKind;
use crate::siren::Entity;

/// Store lifecycle events
#[derive(Debug, Clone)]
pub enum StoreEvent {
  /// The number of requests in flight changed
  Inflight { count: usize },
  /// An entity was stored under its self href
  Update { href: String, entity: Arc<Entity> },
  /// A fetch or action submission failed
  Error { kind: ErrorKind, message: String },
}

/// Fan-out of store events to any number of subscribers.
///
/// Emission never blocks; subscribers whose receiver was dropped are
/// pruned on the next emit.
#[derive(Debug, Default)]
pub struct EventNotifier {
  subscribers: Mutex<Vec<mpsc::UnboundedSender<StoreEvent>>>,
}

impl EventNotifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&self) -> EventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    self
      .subscribers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(tx);
    EventReceiver { rx }
  }

  pub fn emit(&self, event: StoreEvent) {
    let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
  }

  #[cfg(test)]
  fn subscriber_count(&self) -> usize {
    self
      .subscribers
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .len()
  }
}

/// Receiving end of a subscription
#[derive(Debug)]
pub struct EventReceiver {
  rx: mpsc::UnboundedReceiver<StoreEvent>,
}

impl EventReceiver {
  /// Receive the next event
  pub async fn next(&mut self) -> Option<StoreEvent> {
    self.rx.recv().await
  }

  /// Take every event already emitted, without waiting.
  pub fn drain(&mut self) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = self.rx.try_recv() {
      events.push(event);
    }
    events
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_every_subscriber_receives_events() {
    let notifier = EventNotifier::new();
    let mut a = notifier.subscribe();
    let mut b = notifier.subscribe();

    notifier.emit(StoreEvent::Inflight { count: 1 });

    assert!(matches!(a.drain().as_slice(), [StoreEvent::Inflight { count: 1 }]));
    assert!(matches!(b.drain().as_slice(), [StoreEvent::Inflight { count: 1 }]));
  }

  #[test]
  fn test_dropped_subscribers_are_pruned() {
    let notifier = EventNotifier::new();
    let keep = notifier.subscribe();
    drop(notifier.subscribe());
    assert_eq!(notifier.subscriber_count(), 2);

    notifier.emit(StoreEvent::Inflight { count: 0 });
    assert_eq!(notifier.subscriber_count(), 1);
    drop(keep);
  }

  #[test]
  fn test_emit_without_subscribers() {
    let notifier = EventNotifier::new();
    notifier.emit(StoreEvent::Error {
      kind: ErrorKind::Transport,
      message: "boom".to_string(),
    });
    assert_eq!(notifier.subscriber_count(), 0);
  }

  #[tokio::test]
  async fn test_next_waits_for_event() {
    let notifier = Arc::new(EventNotifier::new());
    let mut rx = notifier.subscribe();

    let emitter = Arc::clone(&notifier);
    tokio::spawn(async move {
      emitter.emit(StoreEvent::Inflight { count: 3 });
    });

    assert!(matches!(rx.next().await, Some(StoreEvent::Inflight { count: 3 })));
  }
}
