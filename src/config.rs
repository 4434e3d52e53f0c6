//! Process configuration. The core reads no settings beyond its
//! environment — there is no TOML/document-store config layer here,
//! unlike a typical `AppConfig::from_file`.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub netflow_port: u16,
    pub sflow_port: u16,
    pub influxdb_url: String,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,
    pub redis_url: String,
    /// Per-lookup reverse-DNS timeout, kept short enough that a stalled
    /// resolver never backs up the fast path; not exposed as an env
    /// knob since nothing downstream needs to tune it.
    pub dns_timeout_secs: u64,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_port(name: &str, default: u16) -> Result<u16> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a valid u16 port, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl CollectorConfig {
    /// Load from the environment. Fails only on the genuinely fatal
    /// conditions: a missing required env var (`INFLUXDB_TOKEN`) or a
    /// malformed port number.
    pub fn from_env() -> Result<Self> {
        let influxdb_token = std::env::var("INFLUXDB_TOKEN").unwrap_or_default();
        if influxdb_token.is_empty() {
            bail!("INFLUXDB_TOKEN is required and must not be empty");
        }

        Ok(Self {
            netflow_port: env_port("NETFLOW_PORT", 2055)?,
            sflow_port: env_port("SFLOW_PORT", 6343)?,
            influxdb_url: env_or("INFLUXDB_URL", "http://influxdb:8086"),
            influxdb_token,
            influxdb_org: env_or("INFLUXDB_ORG", "network-monitoring"),
            influxdb_bucket: env_or("INFLUXDB_BUCKET", "traffic"),
            redis_url: env_or("REDIS_URL", "redis://redis:6379"),
            dns_timeout_secs: 2,
        })
    }
}
