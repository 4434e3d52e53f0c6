//! End-to-end integration tests for the collector core.
//!
//! Each test builds real datagram bytes, drives them through
//! `receiver::handle_datagram` against a `CoreContext` wired to the
//! in-memory `FakeKeyedStore`/`FakeTimeSeriesStore`, and asserts on the
//! resulting counters/points, exercising the full decode → classify →
//! emit → aggregate → publish pipeline in one pass rather than one
//! module at a time.

use std::net::Ipv4Addr;
use std::sync::Arc;

use netflow_collector::context::CoreContext;
use netflow_collector::dns::{HostnameResolver, LookupOutcome, ReverseResolver};
use netflow_collector::pubsub::Publisher;
use netflow_collector::receiver::handle_datagram;
use netflow_collector::store::fakes::{FakeKeyedStore, FakeTimeSeriesStore};
use netflow_collector::store::{KeyedStore, TimeSeriesStore};
use netflow_collector::template_cache::TemplateCache;

/// Never resolves anything — keeps these tests independent of a live
/// resolver while still exercising the cache-miss → cache-IP-string path.
struct NoopResolver;

#[async_trait::async_trait]
impl ReverseResolver for NoopResolver {
    async fn reverse_lookup(&self, _addr: Ipv4Addr) -> LookupOutcome {
        LookupOutcome::Failed
    }
}

/// Resolves every address to a fixed hostname, to exercise the DNS
/// cache-hit path without a live resolver.
struct FixedResolver {
    hostname: String,
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl ReverseResolver for FixedResolver {
    async fn reverse_lookup(&self, _addr: Ipv4Addr) -> LookupOutcome {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        LookupOutcome::Hostname(self.hostname.clone())
    }
}

fn test_context(
    resolver: Arc<dyn ReverseResolver>,
) -> (CoreContext, Arc<FakeKeyedStore>, Arc<FakeTimeSeriesStore>) {
    let keyed = Arc::new(FakeKeyedStore::new());
    let ts = Arc::new(FakeTimeSeriesStore::new());
    let dns = Arc::new(HostnameResolver::new(
        keyed.clone() as Arc<dyn KeyedStore>,
        resolver,
    ));
    let publisher = Arc::new(Publisher::new(keyed.clone() as Arc<dyn KeyedStore>));
    let ctx = CoreContext {
        keyed_store: keyed.clone() as Arc<dyn KeyedStore>,
        ts_store: ts.clone() as Arc<dyn TimeSeriesStore>,
        dns,
        publisher,
        templates: Arc::new(TemplateCache::new()),
    };
    (ctx, keyed, ts)
}

fn v5_datagram(records: &[(Ipv4Addr, Ipv4Addr, u32, u32, u8, u16, u16)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&5u16.to_be_bytes());
    buf.extend_from_slice(&(records.len() as u16).to_be_bytes());
    buf.extend_from_slice(&1000u32.to_be_bytes()); // sys_uptime
    buf.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix_secs
    buf.extend_from_slice(&0u32.to_be_bytes()); // unix_nsecs
    buf.extend_from_slice(&1u32.to_be_bytes()); // flow_sequence
    buf.push(0); // engine_type
    buf.push(0); // engine_id
    buf.extend_from_slice(&0u16.to_be_bytes()); // sampling_interval

    for &(src, dst, bytes, packets, proto, src_port, dst_port) in records {
        buf.extend_from_slice(&src.octets());
        buf.extend_from_slice(&dst.octets());
        buf.extend_from_slice(&Ipv4Addr::UNSPECIFIED.octets()); // next_hop
        buf.extend_from_slice(&0u16.to_be_bytes()); // input_if
        buf.extend_from_slice(&0u16.to_be_bytes()); // output_if
        buf.extend_from_slice(&packets.to_be_bytes());
        buf.extend_from_slice(&bytes.to_be_bytes());
        buf.extend_from_slice(&100u32.to_be_bytes()); // first_switched
        buf.extend_from_slice(&200u32.to_be_bytes()); // last_switched
        buf.extend_from_slice(&src_port.to_be_bytes());
        buf.extend_from_slice(&dst_port.to_be_bytes());
        buf.push(0); // pad1
        buf.push(0x02); // tcp_flags
        buf.push(proto);
        buf.push(0); // tos
        buf.extend_from_slice(&0u16.to_be_bytes()); // src_as
        buf.extend_from_slice(&0u16.to_be_bytes()); // dst_as
        buf.push(24); // src_mask
        buf.push(24); // dst_mask
        buf.extend_from_slice(&0u16.to_be_bytes()); // pad2
    }
    buf
}

fn v9_header(source_id: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&9u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // count (informational only)
    buf.extend_from_slice(&1000u32.to_be_bytes());
    buf.extend_from_slice(&1_700_000_000u32.to_be_bytes());
    buf.extend_from_slice(&1u32.to_be_bytes()); // sequence
    buf.extend_from_slice(&source_id.to_be_bytes());
    buf
}

fn wrap_flowset(flowset_id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&flowset_id.to_be_bytes());
    out.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

fn template_flowset_body(template_id: u16, fields: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&template_id.to_be_bytes());
    body.extend_from_slice(&(fields.len() as u16).to_be_bytes());
    for &(t, l) in fields {
        body.extend_from_slice(&t.to_be_bytes());
        body.extend_from_slice(&l.to_be_bytes());
    }
    body
}

/// A v5 datagram with two records, one outbound and one inbound,
/// updates the total/direction counters and the device set, and writes
/// one time-series point per record.
#[tokio::test]
async fn v5_golden_datagram_updates_counters_and_devices() {
    let (ctx, keyed, ts) = test_context(Arc::new(NoopResolver));
    let datagram = v5_datagram(&[
        (
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(8, 8, 8, 8),
            1000,
            2,
            6,
            55000,
            443,
        ),
        (
            Ipv4Addr::new(8, 8, 4, 4),
            Ipv4Addr::new(10, 0, 0, 2),
            500,
            1,
            17,
            53,
            45000,
        ),
    ]);

    handle_datagram(&datagram, Ipv4Addr::new(192, 0, 2, 1), &ctx).await;

    assert_eq!(keyed.counter("stats:total_bytes").await, 1500);
    assert_eq!(keyed.counter("stats:outbound_bytes").await, 1000);
    assert_eq!(keyed.counter("stats:inbound_bytes").await, 500);

    let devices = keyed.set_members("devices").await;
    for ip in ["10.0.0.1", "8.8.8.8", "8.8.4.4", "10.0.0.2"] {
        assert!(devices.contains(ip), "devices should contain {ip}");
    }

    let points = ts.points.lock().await;
    assert_eq!(points.len(), 2);
    let directions: Vec<&str> = points.iter().map(|p| p.tags["direction"].as_str()).collect();
    assert!(directions.contains(&"outbound"));
    assert!(directions.contains(&"inbound"));
}

/// A Template FlowSet in one datagram, a Data FlowSet referencing it
/// in a later datagram from the same exporter.
#[tokio::test]
async fn v9_template_then_data_across_datagrams() {
    let (ctx, keyed, _ts) = test_context(Arc::new(NoopResolver));
    let exporter = Ipv4Addr::new(203, 0, 113, 10);

    let mut datagram1 = v9_header(0);
    datagram1.extend_from_slice(&wrap_flowset(
        0,
        &template_flowset_body(256, &[(8, 4), (12, 4), (1, 4), (2, 4), (4, 1)]),
    ));
    handle_datagram(&datagram1, exporter, &ctx).await;
    assert_eq!(keyed.counter("stats:total_bytes").await, 0);

    let mut record_body = Vec::new();
    record_body.extend_from_slice(&Ipv4Addr::new(192, 168, 1, 10).octets());
    record_body.extend_from_slice(&Ipv4Addr::new(1, 1, 1, 1).octets());
    record_body.extend_from_slice(&2048u32.to_be_bytes());
    record_body.extend_from_slice(&4u32.to_be_bytes());
    record_body.push(6);

    let mut datagram2 = v9_header(0);
    datagram2.extend_from_slice(&wrap_flowset(256, &record_body));
    handle_datagram(&datagram2, exporter, &ctx).await;

    assert_eq!(keyed.counter("stats:total_bytes").await, 2048);
    assert_eq!(keyed.counter("stats:outbound_bytes").await, 2048);
}

/// A Data FlowSet with no prior template is dropped: no counter/time-series
/// effect from the (nonexistent) flow, but the drop itself bumps the
/// observable `stats:templates_missed` counter.
#[tokio::test]
async fn v9_data_before_template_bumps_templates_missed() {
    let (ctx, keyed, ts) = test_context(Arc::new(NoopResolver));
    let exporter = Ipv4Addr::new(203, 0, 113, 20);

    let mut datagram = v9_header(0);
    datagram.extend_from_slice(&wrap_flowset(300, &[0u8; 12]));
    handle_datagram(&datagram, exporter, &ctx).await;

    assert_eq!(keyed.counter("stats:total_bytes").await, 0);
    assert!(ts.points.lock().await.is_empty());
    assert_eq!(keyed.counter("stats:templates_missed").await, 1);
}

/// Two flows sharing `src_addr` within the TTL window resolve through
/// exactly one reverse-DNS call and carry the same hostname tag.
#[tokio::test]
async fn repeated_src_addr_hits_dns_cache_once() {
    let resolver = Arc::new(FixedResolver {
        hostname: "router.lan".to_string(),
        calls: std::sync::atomic::AtomicUsize::new(0),
    });
    let (ctx, _keyed, ts) = test_context(resolver.clone());

    let datagram = v5_datagram(&[
        (
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(8, 8, 8, 8),
            100,
            1,
            6,
            1,
            2,
        ),
        (
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(9, 9, 9, 9),
            200,
            2,
            6,
            3,
            4,
        ),
    ]);
    handle_datagram(&datagram, Ipv4Addr::new(192, 0, 2, 1), &ctx).await;

    let points = ts.points.lock().await;
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].tags["src_hostname"], "router.lan");
    assert_eq!(points[1].tags["src_hostname"], "router.lan");

    // Exactly one call for the shared src_addr, one for each distinct
    // dst_addr — never a second call for the repeated src_addr.
    assert_eq!(resolver.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

/// A malformed/too-short datagram must not panic the pipeline and must
/// leave no flow-counter trace; an unknown-version datagram bumps the
/// observable `stats:unknown_version` counter instead.
#[tokio::test]
async fn malformed_datagram_is_dropped_without_panic() {
    let (ctx, keyed, ts) = test_context(Arc::new(NoopResolver));
    handle_datagram(&[0x00], Ipv4Addr::new(192, 0, 2, 1), &ctx).await;
    handle_datagram(&[0x00, 0x07, 0x00, 0x00], Ipv4Addr::new(192, 0, 2, 1), &ctx).await;

    assert_eq!(keyed.counter("stats:total_bytes").await, 0);
    assert!(ts.points.lock().await.is_empty());
    assert_eq!(keyed.counter("stats:unknown_version").await, 1);
}
