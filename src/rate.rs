//! Rate Deriver + Pusher — every 3 seconds, samples the cumulative
//! `stats:total_bytes`/`stats:total_packets` counters and publishes a
//! floored average rate since the previous sample.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::pubsub::{Publisher, TrafficUpdate};
use crate::store::KeyedStore;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(3);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// One counter sample: cumulative totals at a point in time. Held
/// single-instance by the sampler loop and overwritten each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateSample {
    bytes: i64,
    packets: i64,
}

async fn read_totals(store: &dyn KeyedStore) -> anyhow::Result<RateSample> {
    let bytes = store
        .get("stats:total_bytes")
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let packets = store
        .get("stats:total_packets")
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    Ok(RateSample { bytes, packets })
}

/// Per-second rate between two samples `elapsed_secs` apart, floored to
/// an integer. Zero or negative elapsed time yields a zero rate rather
/// than dividing by zero or going negative.
fn derive_rate(prev: RateSample, current: RateSample, elapsed_secs: i64) -> (i64, i64) {
    if elapsed_secs <= 0 {
        return (0, 0);
    }
    let bytes_rate = (current.bytes - prev.bytes).max(0) / elapsed_secs;
    let packets_rate = (current.packets - prev.packets).max(0) / elapsed_secs;
    (bytes_rate, packets_rate)
}

/// Run the sampler loop forever. Intended to be spawned as its own
/// task; never returns under normal operation. Each tick re-derives the
/// elapsed time from the previous sample's own timestamp rather than
/// assuming the sleep held exactly, so scheduling jitter cannot skew
/// the rate.
pub async fn run(store: Arc<dyn KeyedStore>, publisher: Arc<Publisher>) {
    let mut prev = match read_totals(store.as_ref()).await {
        Ok(sample) => sample,
        Err(e) => {
            warn!(error = %e, "initial rate sample failed, starting from zero");
            RateSample { bytes: 0, packets: 0 }
        }
    };
    let mut prev_time: DateTime<Utc> = Utc::now();

    loop {
        tokio::time::sleep(SAMPLE_INTERVAL).await;

        let current = match read_totals(store.as_ref()).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "rate sample read failed, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        let now = Utc::now();
        let elapsed_secs = (now - prev_time).num_seconds();
        let (bytes_rate, packets_rate) = derive_rate(prev, current, elapsed_secs);
        prev = current;
        prev_time = now;

        let update = TrafficUpdate::new(now, bytes_rate, packets_rate);
        publisher.publish_traffic_update(&update).await;
    }
}
