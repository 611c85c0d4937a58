use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::hookrelay::types::{Payload, Topic};

/// One payload in flight, acknowledged by the consumer on receipt
struct Handoff {
    payload: Payload,
    ack: oneshot::Sender<()>,
}

struct Registration {
    id: u64,
    tx: mpsc::Sender<Handoff>,
}

/// Outcome of a publish. Callers outside the bus treat all three alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The registered consumer took the payload
    Delivered,
    /// Nobody is subscribed to the topic
    Dropped,
    /// The registered consumer went away before taking the payload
    Detached,
}

/// Receiving end of a topic registration
pub struct Subscription {
    topic: Topic,
    id: u64,
    rx: mpsc::Receiver<Handoff>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next payload and releases its publisher.
    ///
    /// Returns `None` once the registration has been replaced or removed and
    /// no publisher is still handing off on this channel. Cancel safe.
    pub async fn recv(&mut self) -> Option<Payload> {
        let handoff = self.rx.recv().await?;
        // The publisher may have been cancelled meanwhile; the payload is ours either way.
        let _ = handoff.ack.send(());
        Some(handoff.payload)
    }
}

/// Topic registry: at most one consumer channel per topic
#[derive(Default)]
pub struct PubSub {
    subs: RwLock<HashMap<Topic, Registration>>,
    next_id: AtomicU64,
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh channel as the sole destination for `topic`,
    /// replacing any previous registration.
    pub fn subscribe(&self, topic: impl Into<Topic>) -> Subscription {
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let previous = self.write().insert(topic.clone(), Registration { id, tx });
        match previous {
            Some(old) => info!("Replaced subscription {} for topic {:?} with {}", old.id, topic, id),
            None => debug!("Added subscription {} for topic {:?}", id, topic),
        }

        Subscription { topic, id, rx }
    }

    /// Removes the registration if `subscription` is still the current one
    pub fn unsubscribe(&self, subscription: Subscription) {
        if self.detach(&subscription.topic, subscription.id) {
            debug!("Removed subscription {} for topic {:?}", subscription.id, subscription.topic);
        } else {
            debug!("Subscription {} for topic {:?} was already replaced", subscription.id, subscription.topic);
        }
    }

    /// Hands `payload` to the consumer of `topic`.
    ///
    /// Suspends until the consumer has received the payload. Returns at once
    /// with `Dropped` if the topic has no consumer. The registry lock is only
    /// held for the lookup.
    pub async fn publish(&self, topic: &str, payload: Payload) -> Delivery {
        let target = self.read().get(topic).map(|reg| (reg.id, reg.tx.clone()));
        let Some((id, tx)) = target else {
            debug!("No subscriber for topic {:?}, dropping {} bytes", topic, payload.len());
            return Delivery::Dropped;
        };

        let (ack, acked) = oneshot::channel();
        if tx.send(Handoff { payload, ack }).await.is_err() {
            self.detach_dead(topic, id);
            return Delivery::Detached;
        }
        drop(tx);

        match acked.await {
            Ok(()) => {
                debug!("Delivered payload to subscription {} for topic {:?}", id, topic);
                Delivery::Delivered
            }
            Err(_) => {
                self.detach_dead(topic, id);
                Delivery::Detached
            }
        }
    }

    /// Whether a consumer is registered for `topic`
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.read().contains_key(topic)
    }

    /// All topics with a registration, sorted
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn detach_dead(&self, topic: &str, id: u64) {
        if self.detach(topic, id) {
            warn!("Subscriber {} for topic {:?} is gone, registration removed", id, topic);
        }
    }

    fn detach(&self, topic: &str, id: u64) -> bool {
        let mut subs = self.write();
        if subs.get(topic).is_some_and(|reg| reg.id == id) {
            subs.remove(topic);
            true
        } else {
            false
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Topic, Registration>> {
        self.subs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Topic, Registration>> {
        self.subs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
