//! Flow classifier — direction (inbound/outbound/internal/external) and
//! protocol-number → mnemonic mapping.

use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
    Internal,
    External,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
            Direction::Internal => "internal",
            Direction::External => "external",
        }
    }
}

fn private_ranges() -> [Ipv4Network; 3] {
    [
        Ipv4Network::from_str("10.0.0.0/8").unwrap(),
        Ipv4Network::from_str("172.16.0.0/12").unwrap(),
        Ipv4Network::from_str("192.168.0.0/16").unwrap(),
    ]
}

/// RFC 1918 private-range membership.
pub fn is_private(addr: Ipv4Addr) -> bool {
    private_ranges().iter().any(|net| net.contains(addr))
}

/// Direction classification policy. Malformed addresses are not representable
/// once parsed into `Ipv4Addr`, so the "classify as external" rule for
/// non-quad input lives at the caller (whatever turns wire bytes/strings
/// into `Ipv4Addr` either succeeds or the flow is dropped upstream); here
/// we only need the four-way table over two already-valid addresses.
pub fn classify_direction(src: Ipv4Addr, dst: Ipv4Addr) -> Direction {
    match (is_private(src), is_private(dst)) {
        (true, false) => Direction::Outbound,
        (false, true) => Direction::Inbound,
        (true, true) => Direction::Internal,
        (false, false) => Direction::External,
    }
}

/// Protocol-number → mnemonic mapping.
pub fn protocol_name(protocol: u8) -> String {
    match protocol {
        1 => "ICMP".to_string(),
        6 => "TCP".to_string(),
        17 => "UDP".to_string(),
        47 => "GRE".to_string(),
        50 => "ESP".to_string(),
        51 => "AH".to_string(),
        58 => "ICMPv6".to_string(),
        n => format!("Protocol-{n}"),
    }
}
