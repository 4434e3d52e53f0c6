//! Datagram Receiver + Version Dispatcher. One UDP socket per
//! configured port, `SO_REUSEADDR` set before handing the socket to
//! tokio, a 65535-byte receive buffer per datagram (the maximum
//! possible UDP payload), and one `tokio::spawn`ed task per datagram so
//! a slow downstream write never blocks the next `recv_from`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

use crate::aggregate;
use crate::classify::{self, classify_direction};
use crate::context::CoreContext;
use crate::emit;
use crate::error::CollectorError;
use crate::flow::FlowRecord;
use crate::netflow_v5::parse_v5_packet;
use crate::netflow_v9::decode_v9;
use crate::pubsub::FlowEvent;

const MAX_DATAGRAM_SIZE: usize = 65535;

fn bind_socket(addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

/// Bind `port` on all interfaces and loop forever, spawning one task per
/// received datagram. Never returns under normal operation.
pub async fn run(port: u16, ctx: CoreContext) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = Arc::new(bind_socket(addr)?);
    debug!(port, "netflow receiver bound");

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "udp recv_from failed");
                continue;
            }
        };

        let datagram = buf[..len].to_vec();
        let exporter = match peer.ip() {
            std::net::IpAddr::V4(v4) => v4,
            std::net::IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        };
        let ctx = ctx.clone();

        tokio::spawn(async move {
            handle_datagram(&datagram, exporter, &ctx).await;
        });
    }
}

/// Decode one datagram (version-dispatched), then run every resulting
/// record through classify → emit → aggregate → publish. Public so
/// integration tests (and anything else that already has a parsed
/// datagram, e.g. a future replay tool) can drive the pipeline without
/// going through an actual UDP socket.
pub async fn handle_datagram(datagram: &[u8], exporter: Ipv4Addr, ctx: &CoreContext) {
    if datagram.len() < 2 {
        warn!("datagram too short to carry a version field, dropping");
        return;
    }
    let version = u16::from_be_bytes([datagram[0], datagram[1]]);

    let records = match version {
        5 => match parse_v5_packet(datagram) {
            Ok(records) => records,
            Err(e) => {
                warn!(%exporter, error = %e, "v5 datagram rejected");
                return;
            }
        },
        9 => match decode_v9(datagram, exporter, &ctx.templates) {
            Ok(result) => {
                if result.templates_missed > 0 {
                    bump_counter(ctx, "stats:templates_missed", result.templates_missed as i64).await;
                }
                result.records
            }
            Err(e) => {
                warn!(%exporter, error = %e, "v9 datagram rejected");
                return;
            }
        },
        other => {
            let err = CollectorError::UnknownVersion(other);
            warn!(%exporter, error = %err, "unsupported netflow version");
            bump_counter(ctx, "stats:unknown_version", 1).await;
            return;
        }
    };

    for record in records {
        process_record(record, exporter, ctx).await;
    }
}

/// Increment an error-taxonomy counter (`stats:templates_missed`,
/// `stats:unknown_version`) in the keyed store so these drops are
/// observable outside of logs, per the error-handling design's
/// "increment a counter" requirement. Best-effort, like every other
/// keyed-store write on the fast path.
async fn bump_counter(ctx: &CoreContext, key: &str, delta: i64) {
    if let Err(e) = ctx.keyed_store.incrby(key, delta).await {
        error!(key, error = %e, "failed to increment error counter");
    }
}

async fn process_record(flow: FlowRecord, exporter: Ipv4Addr, ctx: &CoreContext) {
    let direction = classify_direction(flow.src_addr, flow.dst_addr);
    let protocol = classify::protocol_name(flow.protocol);

    let src_hostname = ctx.dns.resolve(flow.src_addr).await;
    let dst_hostname = ctx.dns.resolve(flow.dst_addr).await;

    let point = emit::build_point(&flow, exporter, direction, &protocol, &src_hostname, &dst_hostname);
    emit::emit(&ctx.ts_store, point).await;

    aggregate::apply(ctx.keyed_store.as_ref(), &flow, direction).await;

    let event = FlowEvent::new(flow.bytes, flow.packets, direction, flow.src_addr, flow.dst_addr);
    ctx.publisher.publish_flow_event(&event).await;
}
