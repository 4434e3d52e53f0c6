//! Error taxonomy for the fast path. These are never propagated above
//! the per-datagram or per-flowset call site that produces them — they
//! exist so a call site can match on *kind* before deciding whether to log
//! and drop, rather than threading `anyhow::Error` through hot code.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// Datagram shorter than the version field, a header, or a declared
    /// record/flowset length that overruns the buffer.
    MalformedDatagram(&'static str),
    /// First two octets were neither 5 nor 9.
    UnknownVersion(u16),
    /// A Data FlowSet referenced a template that has not been observed
    /// (or was observed and then looked up under the wrong exporter).
    TemplateMissing { source_id: u32, template_id: u16 },
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::MalformedDatagram(reason) => {
                write!(f, "malformed datagram: {reason}")
            }
            CollectorError::UnknownVersion(v) => write!(f, "unknown NetFlow version {v}"),
            CollectorError::TemplateMissing {
                source_id,
                template_id,
            } => write!(
                f,
                "no template {template_id} for source_id {source_id}"
            ),
        }
    }
}

impl std::error::Error for CollectorError {}
