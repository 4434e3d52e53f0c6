//! Publisher — pushes flow and rate events to the live-update fabric.
//! An in-process `tokio::sync::broadcast` channel gives the
//! subscription set of peers for free, including its eviction
//! behavior: a lagging receiver drops messages instead of blocking the
//! sender, which is exactly best-effort, no-backpressure delivery. The
//! same payload is also handed to the keyed store's `publish`, the
//! transport used by anything relaying these events further out.

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::classify::Direction;
use crate::store::KeyedStore;

pub const REALTIME_TRAFFIC_CHANNEL: &str = "realtime_traffic";

/// Per-flow event. Deliberately untagged — only `traffic_update`
/// messages carry a `type` field.
#[derive(Debug, Clone, Serialize)]
pub struct FlowEvent {
    pub timestamp: DateTime<Utc>,
    pub bytes: u64,
    pub packets: u64,
    pub direction: &'static str,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
}

impl FlowEvent {
    pub fn new(bytes: u64, packets: u64, direction: Direction, src_addr: Ipv4Addr, dst_addr: Ipv4Addr) -> Self {
        Self {
            timestamp: Utc::now(),
            bytes,
            packets,
            direction: direction.as_str(),
            src_addr,
            dst_addr,
        }
    }
}

/// `traffic_update` message. Must carry the literal string
/// `"type":"traffic_update"` so consumers can distinguish it from a
/// per-flow event on the same channel.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficUpdate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: TrafficUpdateData,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficUpdateData {
    pub timestamp: DateTime<Utc>,
    pub bytes: i64,
    pub packets: i64,
}

impl TrafficUpdate {
    pub fn new(timestamp: DateTime<Utc>, bytes: i64, packets: i64) -> Self {
        Self {
            kind: "traffic_update",
            data: TrafficUpdateData {
                timestamp,
                bytes,
                packets,
            },
        }
    }
}

pub struct Publisher {
    store: Arc<dyn KeyedStore>,
    hub: broadcast::Sender<Arc<str>>,
    channel: String,
}

impl Publisher {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self::with_channel(store, REALTIME_TRAFFIC_CHANNEL)
    }

    pub fn with_channel(store: Arc<dyn KeyedStore>, channel: &str) -> Self {
        let (hub, _) = broadcast::channel(256);
        Self {
            store,
            hub,
            channel: channel.to_string(),
        }
    }

    /// Subscribe to the in-process broadcast hub.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.hub.subscribe()
    }

    pub async fn publish_flow_event(&self, event: &FlowEvent) {
        self.broadcast_json(event).await;
    }

    pub async fn publish_traffic_update(&self, update: &TrafficUpdate) {
        self.broadcast_json(update).await;
    }

    async fn broadcast_json<T: Serialize>(&self, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to serialize publish payload");
                return;
            }
        };

        // Best-effort: no receivers connected is not an error.
        let _ = self.hub.send(Arc::from(payload.as_str()));

        if let Err(e) = self.store.publish(&self.channel, &payload).await {
            warn!(error = %e, channel = %self.channel, "keyed-store publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fakes::FakeKeyedStore;

    #[tokio::test]
    async fn flow_event_is_broadcast_and_published() {
        let store = Arc::new(FakeKeyedStore::new());
        let publisher = Publisher::new(store.clone());
        let mut rx = publisher.subscribe();

        let event = FlowEvent::new(
            1000,
            2,
            Direction::Outbound,
            std::net::Ipv4Addr::new(10, 0, 0, 1),
            std::net::Ipv4Addr::new(8, 8, 8, 8),
        );
        publisher.publish_flow_event(&event).await;

        let received = rx.try_recv().unwrap();
        assert!(received.contains("\"direction\":\"outbound\""));

        let published = store.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, REALTIME_TRAFFIC_CHANNEL);
    }

    /// The literal type tag must be present on traffic-update messages.
    #[tokio::test]
    async fn traffic_update_carries_literal_type() {
        let store = Arc::new(FakeKeyedStore::new());
        let publisher = Publisher::new(store.clone());
        let update = TrafficUpdate::new(Utc::now(), 2000, 10);
        publisher.publish_traffic_update(&update).await;

        let published = store.published.lock().await;
        assert!(published[0].1.contains("\"type\":\"traffic_update\""));
    }

    #[tokio::test]
    async fn slow_subscriber_loses_messages_without_blocking() {
        let store = Arc::new(FakeKeyedStore::new());
        let publisher = Publisher::with_channel(store, "test_channel");
        let mut rx = publisher.subscribe();

        for i in 0..300u64 {
            let event = FlowEvent::new(
                i,
                1,
                Direction::External,
                std::net::Ipv4Addr::new(1, 1, 1, 1),
                std::net::Ipv4Addr::new(2, 2, 2, 2),
            );
            publisher.publish_flow_event(&event).await;
        }

        // The receiver never drained — it must observe a lag error rather
        // than the publisher blocking or panicking.
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Lagged(_))));
    }
}
