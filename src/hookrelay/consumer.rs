use std::sync::Arc;

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{ErrorCode, RelayError};
use crate::hookrelay::pubsub::{PubSub, Subscription};
use crate::hookrelay::sink::Sink;
use crate::hookrelay::types::Topic;

/// Subscribes every topic and spawns one consumer per topic on `tracker`.
///
/// Registrations are in place when this returns, before any task has run.
pub fn spawn_consumers(
    bus: &Arc<PubSub>,
    topics: &[Topic],
    sink: Arc<dyn Sink>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) {
    for topic in topics {
        let sub = bus.subscribe(topic.as_str());
        tracker.spawn(handle_topic(bus.clone(), sub, sink.clone(), cancel.child_token()));
    }
    info!("Started {} topic consumers", topics.len());
}

/// Forwards payloads from `sub` to `sink` until cancelled.
///
/// Cancellation wins over a ready payload: once `cancel` fires nothing more is
/// written, and a payload still waiting in the channel is left to detach.
pub async fn handle_topic(
    bus: Arc<PubSub>,
    mut sub: Subscription,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
) {
    let topic = sub.topic().to_owned();
    info!("Consumer for topic {:?} started", topic);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Consumer for topic {:?} cancelled", topic);
                break;
            }
            payload = sub.recv() => match payload {
                Some(payload) => {
                    debug!("Topic {:?}: received {} bytes", topic, payload.len());
                    if let Err(e) = sink.write_payload(&payload) {
                        let err = RelayError::new(ErrorCode::SinkWriteFailed, e.to_string());
                        error!("Topic {:?}: {}", topic, err);
                    }
                }
                None => {
                    info!("Subscription for topic {:?} was replaced, consumer exiting", topic);
                    return;
                }
            }
        }
    }

    bus.unsubscribe(sub);
    info!("Consumer for topic {:?} stopped", topic);
}
