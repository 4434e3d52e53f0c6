//! Time-series Emitter — builds one `network_traffic` point per flow
//! and writes it to the time-series store. Write failures are logged
//! and the flow is dropped; there is no retry queue, flows are lossy
//! by design.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use crate::classify::Direction;
use crate::flow::FlowRecord;
use crate::store::{TimeSeriesPoint, TimeSeriesStore};

pub fn build_point(
    flow: &FlowRecord,
    source: Ipv4Addr,
    direction: Direction,
    protocol_name: &str,
    src_hostname: &str,
    dst_hostname: &str,
) -> TimeSeriesPoint {
    let mut tags = HashMap::new();
    tags.insert("source".to_string(), source.to_string());
    tags.insert("src_addr".to_string(), flow.src_addr.to_string());
    tags.insert("dst_addr".to_string(), flow.dst_addr.to_string());
    tags.insert("src_hostname".to_string(), src_hostname.to_string());
    tags.insert("dst_hostname".to_string(), dst_hostname.to_string());
    tags.insert("protocol".to_string(), protocol_name.to_string());
    tags.insert("direction".to_string(), direction.as_str().to_string());

    let mut fields = HashMap::new();
    fields.insert("bytes".to_string(), flow.bytes as i64);
    fields.insert("packets".to_string(), flow.packets as i64);
    fields.insert("src_port".to_string(), flow.src_port as i64);
    fields.insert("dst_port".to_string(), flow.dst_port as i64);

    TimeSeriesPoint {
        measurement: "network_traffic".to_string(),
        tags,
        fields,
        time: Utc::now(),
    }
}

/// Write the point, logging and dropping the flow on failure.
pub async fn emit(store: &Arc<dyn TimeSeriesStore>, point: TimeSeriesPoint) {
    if let Err(e) = store.write(point).await {
        error!(error = %e, "time-series write failed, dropping flow");
    }
}
