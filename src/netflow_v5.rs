//! NetFlow v5 decoder — fixed 24-byte header, 48-byte records.

use std::net::Ipv4Addr;

use crate::error::CollectorError;
use crate::flow::FlowRecord;

pub const V5_HEADER_LEN: usize = 24;
pub const V5_RECORD_LEN: usize = 48;

#[derive(Debug, Clone)]
pub struct NetflowV5Header {
    pub version: u16,
    pub count: u16,
    pub sys_uptime: u32,
    pub unix_secs: u32,
    pub unix_nsecs: u32,
    pub flow_sequence: u32,
    pub engine_type: u8,
    pub engine_id: u8,
    pub sampling_interval: u16,
}

/// Parse a NetFlow v5 header from the first 24 bytes of `buf`.
/// Drops the whole datagram (returns `Err`) if the version field inside
/// the header is not 5.
pub fn parse_v5_header(buf: &[u8]) -> Result<NetflowV5Header, CollectorError> {
    if buf.len() < V5_HEADER_LEN {
        return Err(CollectorError::MalformedDatagram("v5 header truncated"));
    }
    let version = u16::from_be_bytes([buf[0], buf[1]]);
    if version != 5 {
        return Err(CollectorError::MalformedDatagram("v5 header version mismatch"));
    }
    Ok(NetflowV5Header {
        version,
        count: u16::from_be_bytes([buf[2], buf[3]]),
        sys_uptime: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        unix_secs: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        unix_nsecs: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        flow_sequence: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        engine_type: buf[20],
        engine_id: buf[21],
        sampling_interval: u16::from_be_bytes([buf[22], buf[23]]),
    })
}

/// Parse a single 48-byte v5 record into a normalised `FlowRecord`.
fn parse_v5_record(buf: &[u8]) -> Option<FlowRecord> {
    if buf.len() < V5_RECORD_LEN {
        return None;
    }
    Some(FlowRecord {
        src_addr: Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]),
        dst_addr: Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
        next_hop: Ipv4Addr::new(buf[8], buf[9], buf[10], buf[11]),
        input_if: u16::from_be_bytes([buf[12], buf[13]]),
        output_if: u16::from_be_bytes([buf[14], buf[15]]),
        packets: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]) as u64,
        bytes: u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]) as u64,
        first_switched: u32::from_be_bytes([buf[24], buf[25], buf[26], buf[27]]),
        last_switched: u32::from_be_bytes([buf[28], buf[29], buf[30], buf[31]]),
        src_port: u16::from_be_bytes([buf[32], buf[33]]),
        dst_port: u16::from_be_bytes([buf[34], buf[35]]),
        tcp_flags: buf[37],
        protocol: buf[38],
        tos: buf[39],
    })
}

/// Parse a complete v5 datagram: header + up to `count` records, stopping
/// early if the buffer runs out before all records are consumed.
pub fn parse_v5_packet(buf: &[u8]) -> Result<Vec<FlowRecord>, CollectorError> {
    let header = parse_v5_header(buf)?;
    let mut records = Vec::with_capacity(header.count as usize);
    let mut offset = V5_HEADER_LEN;
    for _ in 0..header.count {
        if buf.len() - offset < V5_RECORD_LEN {
            break;
        }
        if let Some(rec) = parse_v5_record(&buf[offset..offset + V5_RECORD_LEN]) {
            records.push(rec);
        }
        offset += V5_RECORD_LEN;
    }
    Ok(records)
}
