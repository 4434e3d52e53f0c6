//! Counter Aggregator — atomic increments against the keyed store.
//! Each operation is individually atomic; the group is not, and
//! downstream readers of `stats:*` must tolerate that skew.

use chrono::Utc;
use tracing::error;

use crate::classify::Direction;
use crate::flow::FlowRecord;
use crate::store::KeyedStore;

/// Apply one flow's effect on the counter bundle. Every sub-operation is
/// attempted independently; a failure on one does not stop the others.
/// Write failures are logged, never retried, and never propagated out
/// of the fast path.
pub async fn apply(store: &dyn KeyedStore, flow: &FlowRecord, direction: Direction) {
    let bytes = flow.bytes as i64;
    let packets = flow.packets as i64;

    log_err(store.incrby("stats:total_bytes", bytes).await, "stats:total_bytes");
    log_err(store.incrby("stats:total_packets", packets).await, "stats:total_packets");

    let dir = direction.as_str();
    log_err(
        store.incrby(&format!("stats:{dir}_bytes"), bytes).await,
        "stats:<direction>_bytes",
    );
    log_err(
        store.incrby(&format!("stats:{dir}_packets"), packets).await,
        "stats:<direction>_packets",
    );

    let src_key = format!("device:{}", flow.src_addr);
    let dst_key = format!("device:{}", flow.dst_addr);

    log_err(
        store.hincrby(&src_key, "bytes_sent", bytes).await,
        "device.bytes_sent",
    );
    log_err(
        store.hincrby(&dst_key, "bytes_received", bytes).await,
        "device.bytes_received",
    );

    let now = Utc::now().to_rfc3339();
    log_err(store.hset(&src_key, "last_seen", &now).await, "device.last_seen (src)");
    log_err(store.hset(&dst_key, "last_seen", &now).await, "device.last_seen (dst)");

    log_err(store.sadd("devices", &flow.src_addr.to_string()).await, "devices (src)");
    log_err(store.sadd("devices", &flow.dst_addr.to_string()).await, "devices (dst)");
}

fn log_err<T>(result: anyhow::Result<T>, op: &str) {
    if let Err(e) = result {
        error!(operation = op, error = %e, "counter aggregation write failed");
    }
}
