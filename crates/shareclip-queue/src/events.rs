//! Per-user live event bus.
//!
//! Each user has at most one subscription: a bounded channel owned by the
//! connection handler. Publishing never blocks; when the subscriber falls
//! behind and the buffer is full the event is dropped.
//!
//! A subscription is identified by a [`SubscriptionId`]. Unsubscribing with
//! the id of a subscription that was already replaced leaves the newer one
//! in place.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use shareclip_models::Event;

/// Default per-subscription buffer size.
pub const DEFAULT_EVENT_BUFFER: usize = 16;

/// Identifies one subscription of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A user's live event channel.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::Receiver<Event>,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<Event>,
}

/// Registry of live subscriptions keyed by user ID.
#[derive(Debug)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl EventBus {
    /// Create a bus whose subscriptions buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Send `event` to `user_id` if subscribed.
    pub fn publish(&self, user_id: &str, event: Event) {
        let subscribers = self.read();
        let Some(subscriber) = subscribers.get(user_id) else {
            trace!(user_id, "No subscription, dropping {}", event.kind.as_str());
            return;
        };

        match subscriber.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                counter!("shareclip_events_dropped_total").increment(1);
                debug!(user_id, "Subscriber buffer full, dropping {}", event.kind.as_str());
            }
            Err(TrySendError::Closed(event)) => {
                debug!(user_id, "Subscriber gone, dropping {}", event.kind.as_str());
            }
        }
    }

    /// Open a subscription for `user_id`, replacing any previous one.
    ///
    /// The returned channel starts with a `WELCOME` event. Dropping the
    /// previous sender closes the replaced receiver.
    pub fn subscribe(&self, user_id: &str) -> Subscription {
        let (sender, events) = mpsc::channel(self.buffer);
        // Fresh channel with capacity >= 1 cannot be full
        let _ = sender.try_send(Event::welcome());

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if self
            .write()
            .insert(user_id.to_string(), Subscriber { id, sender })
            .is_some()
        {
            debug!(user_id, "Replaced existing subscription");
        }
        Subscription { id, events }
    }

    /// Remove and close subscription `id` of `user_id`.
    ///
    /// Does nothing when `id` has since been replaced by a newer subscription.
    pub fn unsubscribe(&self, user_id: &str, id: SubscriptionId) {
        let mut subscribers = self.write();
        match subscribers.get(user_id) {
            Some(current) if current.id == id => {
                subscribers.remove(user_id);
                debug!(user_id, "Subscription removed");
            }
            Some(_) => debug!(user_id, "Keeping newer subscription"),
            None => {}
        }
    }

    #[cfg(test)]
    fn is_subscribed(&self, user_id: &str) -> bool {
        self.read().contains_key(user_id)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Subscriber>> {
        self.subscribers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Subscriber>> {
        self.subscribers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shareclip_models::{EventType, JobId};

    #[test]
    fn test_publish_without_subscription_is_noop() {
        let bus = EventBus::default();
        bus.publish("nobody", Event::begin(&JobId::generate()));
        assert!(!bus.is_subscribed("nobody"));
    }

    #[tokio::test]
    async fn test_subscribe_starts_with_welcome() {
        let bus = EventBus::default();
        let id = JobId::generate();
        let mut rx = bus.subscribe("alice").events;

        bus.publish("alice", Event::begin(&id));
        bus.publish("bob", Event::begin(&id));

        assert_eq!(rx.recv().await.unwrap().kind, EventType::Welcome);
        let begin = rx.recv().await.unwrap();
        assert_eq!(begin.kind, EventType::VideoProcessingBegin);
        assert_eq!(begin.subject, id.as_str());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_buffer_drops_events() {
        let bus = EventBus::new(2);
        let id = JobId::generate();
        let mut rx = bus.subscribe("alice").events;

        // WELCOME occupies one slot
        bus.publish("alice", Event::progress(&id, 1));
        bus.publish("alice", Event::progress(&id, 2));

        assert_eq!(rx.recv().await.unwrap().kind, EventType::Welcome);
        assert_eq!(rx.recv().await.unwrap().data, serde_json::json!("1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_and_closes_previous() {
        let bus = EventBus::default();
        let mut first = bus.subscribe("alice");
        let mut second = bus.subscribe("alice");
        assert_ne!(first.id, second.id);

        assert_eq!(first.events.recv().await.unwrap().kind, EventType::Welcome);
        assert!(first.events.recv().await.is_none());

        bus.publish("alice", Event::begin(&JobId::generate()));
        assert_eq!(second.events.recv().await.unwrap().kind, EventType::Welcome);
        assert_eq!(
            second.events.recv().await.unwrap().kind,
            EventType::VideoProcessingBegin
        );
    }

    #[tokio::test]
    async fn test_stale_unsubscribe_keeps_newer_subscription() {
        let bus = EventBus::default();
        let first = bus.subscribe("alice");
        let mut second = bus.subscribe("alice");

        // The replaced connection's handler cleans up after its channel closed
        bus.unsubscribe("alice", first.id);
        assert!(bus.is_subscribed("alice"));

        bus.publish("alice", Event::begin(&JobId::generate()));
        assert_eq!(second.events.recv().await.unwrap().kind, EventType::Welcome);
        assert_eq!(
            second.events.recv().await.unwrap().kind,
            EventType::VideoProcessingBegin
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe("alice");
        bus.unsubscribe("alice", sub.id);
        bus.unsubscribe("alice", sub.id);

        assert_eq!(sub.events.recv().await.unwrap().kind, EventType::Welcome);
        assert!(sub.events.recv().await.is_none());
        assert!(!bus.is_subscribed("alice"));
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped() {
        let bus = EventBus::default();
        drop(bus.subscribe("alice"));
        bus.publish("alice", Event::begin(&JobId::generate()));
        assert!(bus.is_subscribed("alice"));
    }
}
