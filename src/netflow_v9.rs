//! NetFlow v9 decoder — template-based, stateful across datagrams.
//!
//! A single datagram's FlowSets are walked strictly in wire order by one
//! `async` caller, in the order Template FlowSets and Data FlowSets
//! actually appear on the wire — this is what lets a Template FlowSet
//! earlier in the same datagram satisfy a Data FlowSet later in the same
//! datagram.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::error::CollectorError;
use crate::flow::FlowRecord;
use crate::template_cache::{Template, TemplateCache, TemplateField, TemplateKey};

pub const V9_HEADER_LEN: usize = 20;
const FLOWSET_HEADER_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct NetflowV9Header {
    pub version: u16,
    pub count: u16,
    pub sys_uptime: u32,
    pub unix_secs: u32,
    pub sequence: u32,
    pub source_id: u32,
}

/// Outcome of decoding one v9 datagram.
#[derive(Debug, Default)]
pub struct V9DecodeResult {
    pub records: Vec<FlowRecord>,
    /// Count of Data FlowSets dropped for lack of a matching template.
    pub templates_missed: u32,
}

pub fn parse_v9_header(buf: &[u8]) -> Result<NetflowV9Header, CollectorError> {
    if buf.len() < V9_HEADER_LEN {
        return Err(CollectorError::MalformedDatagram("v9 header truncated"));
    }
    let version = u16::from_be_bytes([buf[0], buf[1]]);
    if version != 9 {
        return Err(CollectorError::MalformedDatagram("v9 header version mismatch"));
    }
    Ok(NetflowV9Header {
        version,
        count: u16::from_be_bytes([buf[2], buf[3]]),
        sys_uptime: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        unix_secs: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        sequence: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        source_id: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
    })
}

/// Decode a full v9 datagram, installing any Template FlowSets into
/// `cache` and decoding any Data FlowSets whose template is already
/// known (installed earlier in this same datagram, or in a previous one
/// from the same exporter/source_id).
pub fn decode_v9(
    buf: &[u8],
    exporter: Ipv4Addr,
    cache: &TemplateCache,
) -> Result<V9DecodeResult, CollectorError> {
    let header = parse_v9_header(buf)?;
    let mut result = V9DecodeResult::default();
    let mut offset = V9_HEADER_LEN;

    while offset < buf.len() {
        if buf.len() - offset < FLOWSET_HEADER_LEN {
            break;
        }
        let flowset_id = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let length = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;

        if length < FLOWSET_HEADER_LEN || offset + length > buf.len() {
            debug!(flowset_id, length, "malformed v9 flowset, stopping walk");
            break;
        }

        let body = &buf[offset + FLOWSET_HEADER_LEN..offset + length];

        match flowset_id {
            0 => install_templates(body, exporter, header.source_id, cache),
            1 => {
                // Options FlowSet: parsed for length only, contents ignored.
            }
            template_id if template_id > 255 => {
                match decode_data_flowset(body, exporter, header.source_id, template_id, cache) {
                    Some(mut records) => result.records.append(&mut records),
                    None => {
                        result.templates_missed += 1;
                        warn!(
                            source_id = header.source_id,
                            template_id, "data flowset dropped: no matching template"
                        );
                    }
                }
            }
            other => {
                debug!(flowset_id = other, "ignoring reserved flowset id");
            }
        }

        offset += length;
    }

    Ok(result)
}

/// Parse a Template FlowSet body: a sequence of
/// `(template_id, field_count)` headers each followed by `field_count`
/// `(field_type, field_length)` pairs. Field-count overruns truncate
/// silently.
fn install_templates(body: &[u8], exporter: Ipv4Addr, source_id: u32, cache: &TemplateCache) {
    let mut offset = 0usize;
    while offset + 4 <= body.len() {
        let template_id = u16::from_be_bytes([body[offset], body[offset + 1]]);
        let field_count = u16::from_be_bytes([body[offset + 2], body[offset + 3]]) as usize;
        offset += 4;

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            if offset + 4 > body.len() {
                break;
            }
            fields.push(TemplateField {
                field_type: u16::from_be_bytes([body[offset], body[offset + 1]]),
                field_length: u16::from_be_bytes([body[offset + 2], body[offset + 3]]),
            });
            offset += 4;
        }

        let key = TemplateKey {
            exporter,
            source_id,
            template_id,
        };
        debug!(?key, fields = fields.len(), "installed v9 template");
        cache.install(key, Template { fields });
    }
}

/// Decode a Data FlowSet body using the template registered for
/// `(exporter, source_id, template_id)`. Returns `None` if no such
/// template has been observed.
fn decode_data_flowset(
    body: &[u8],
    exporter: Ipv4Addr,
    source_id: u32,
    template_id: u16,
    cache: &TemplateCache,
) -> Option<Vec<FlowRecord>> {
    let key = TemplateKey {
        exporter,
        source_id,
        template_id,
    };
    let template = cache.get(&key)?;
    let record_size = template.record_size();
    if record_size == 0 {
        return Some(Vec::new());
    }

    let mut records = Vec::new();
    let mut offset = 0usize;
    while body.len() - offset >= record_size {
        records.push(decode_record(&body[offset..offset + record_size], &template));
        offset += record_size;
    }
    Some(records)
}

fn decode_record(buf: &[u8], template: &Template) -> FlowRecord {
    let mut record = FlowRecord::default();
    let mut field_offset = 0usize;

    for field in &template.fields {
        let len = field.field_length as usize;
        let slice = if field_offset + len <= buf.len() {
            &buf[field_offset..field_offset + len]
        } else {
            &[]
        };

        match field.field_type {
            1 => record.bytes = read_counter(slice),
            2 => record.packets = read_counter(slice),
            4 => record.protocol = slice.first().copied().unwrap_or(0),
            5 => record.tos = slice.first().copied().unwrap_or(0),
            7 => record.src_port = read_u16(slice),
            8 => record.src_addr = read_ipv4(slice),
            11 => record.dst_port = read_u16(slice),
            12 => record.dst_addr = read_ipv4(slice),
            15 => record.next_hop = read_ipv4(slice),
            21 => record.last_switched = read_u32(slice),
            22 => record.first_switched = read_u32(slice),
            _ => {} // unknown field types are skipped by field_length
        }

        field_offset += len;
    }

    record
}

/// IN_BYTES/IN_PKTS: 4-byte → u32, 8-byte → u64 big-endian; any other
/// width decodes as 0.
fn read_counter(slice: &[u8]) -> u64 {
    match slice.len() {
        4 => u32::from_be_bytes(slice.try_into().unwrap()) as u64,
        8 => u64::from_be_bytes(slice.try_into().unwrap()),
        _ => 0,
    }
}

fn read_u16(slice: &[u8]) -> u16 {
    if slice.len() == 2 {
        u16::from_be_bytes(slice.try_into().unwrap())
    } else {
        0
    }
}

fn read_u32(slice: &[u8]) -> u32 {
    if slice.len() == 4 {
        u32::from_be_bytes(slice.try_into().unwrap())
    } else {
        0
    }
}

fn read_ipv4(slice: &[u8]) -> Ipv4Addr {
    if slice.len() == 4 {
        Ipv4Addr::new(slice[0], slice[1], slice[2], slice[3])
    } else {
        Ipv4Addr::UNSPECIFIED
    }
}
