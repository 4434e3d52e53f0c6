//! Normalised flow record — the common shape both the v5 and v9 decoders
//! produce, consumed synchronously by the classifier and emitter.

use std::net::Ipv4Addr;

/// One decoded flow record. Constructed per datagram record and consumed
/// immediately; never retained past a single pipeline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRecord {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub input_if: u16,
    pub output_if: u16,
    pub packets: u64,
    pub bytes: u64,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub tcp_flags: u8,
    pub tos: u8,
    pub first_switched: u32,
    pub last_switched: u32,
}

impl Default for FlowRecord {
    fn default() -> Self {
        Self {
            src_addr: Ipv4Addr::UNSPECIFIED,
            dst_addr: Ipv4Addr::UNSPECIFIED,
            next_hop: Ipv4Addr::UNSPECIFIED,
            input_if: 0,
            output_if: 0,
            packets: 0,
            bytes: 0,
            src_port: 0,
            dst_port: 0,
            protocol: 0,
            tcp_flags: 0,
            tos: 0,
            first_switched: 0,
            last_switched: 0,
        }
    }
}
