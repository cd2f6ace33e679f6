//! Synchronous multi-subscriber event bus.
//!
//! Handlers subscribe to one event kind and are invoked in subscription
//! order, on the publisher's stack, every time an event of that kind is
//! published. There is no buffering: a handler that subscribes after a
//! publish never sees that event.

use std::fmt;

/// An event that can travel over an [`EventBus`]
pub trait Event {
    /// Discriminant handlers subscribe to
    type Kind: Copy + Eq + fmt::Debug;

    /// Kind of this event
    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct Subscriber<E: Event> {
    id: SubscriptionId,
    kind: E::Kind,
    handler: Handler<E>,
}

/// Publish/subscribe primitive keyed by event kind
pub struct EventBus<E: Event> {
    subscribers: Vec<Subscriber<E>>,
    next_id: u64,
}

impl<E: Event> EventBus<E> {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register `handler` for events of `kind`
    pub fn subscribe<F>(&mut self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Dispatch `event` to every handler subscribed to its kind
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&mut self, event: &E) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for subscriber in self.subscribers.iter_mut().filter(|s| s.kind == kind) {
            (subscriber.handler)(event);
            delivered += 1;
        }
        delivered
    }

    /// Number of live subscriptions across all kinds
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Ping {
        A(u32),
        B,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum PingKind {
        A,
        B,
    }

    impl Event for Ping {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            match self {
                Ping::A(_) => PingKind::A,
                Ping::B => PingKind::B,
            }
        }
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Arc::clone(&log);
        bus.subscribe(PingKind::A, move |e: &Ping| {
            first.lock().unwrap().push(format!("first {e:?}"));
        });
        let second = Arc::clone(&log);
        bus.subscribe(PingKind::A, move |e: &Ping| {
            second.lock().unwrap().push(format!("second {e:?}"));
        });

        assert_eq!(bus.publish(&Ping::A(1)), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first A(1)".to_string(), "second A(1)".to_string()]
        );
    }

    #[test]
    fn test_kind_filtering() {
        let hits = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let counter = Arc::clone(&hits);
        bus.subscribe(PingKind::B, move |_: &Ping| *counter.lock().unwrap() += 1);

        assert_eq!(bus.publish(&Ping::A(5)), 0);
        assert_eq!(bus.publish(&Ping::B), 1);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let hits = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        bus.publish(&Ping::B);

        let counter = Arc::clone(&hits);
        bus.subscribe(PingKind::B, move |_: &Ping| *counter.lock().unwrap() += 1);
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus: EventBus<Ping> = EventBus::new();
        let id = bus.subscribe(PingKind::A, |_| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(&Ping::A(0)), 0);
    }
}
