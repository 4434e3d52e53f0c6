//! InfluxDB-backed `TimeSeriesStore`. Writes are HTTP line-protocol
//! POSTs, built the same way as any other outbound call in this
//! codebase — build a client, `.post(url).body(...).send()`, log and
//! drop on failure, never retry.

use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use super::{TimeSeriesPoint, TimeSeriesStore};

pub struct InfluxTimeSeriesStore {
    client: reqwest::Client,
    write_url: String,
    token: String,
}

impl InfluxTimeSeriesStore {
    pub fn new(base_url: &str, org: &str, bucket: &str, token: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        let write_url = format!(
            "{}/api/v2/write?org={}&bucket={}&precision=ns",
            base_url.trim_end_matches('/'),
            urlencode(org),
            urlencode(bucket),
        );
        Ok(Self {
            client,
            write_url,
            token: token.to_string(),
        })
    }
}

fn urlencode(s: &str) -> String {
    s.replace(' ', "%20").replace('&', "%26")
}

/// Escape a tag value per InfluxDB line protocol: commas, spaces, and
/// equals signs must be backslash-escaped.
fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace(',', "\\,").replace(' ', "\\ ").replace('=', "\\=")
}

fn escape_measurement(value: &str) -> String {
    value.replace(' ', "\\ ").replace(',', "\\,")
}

/// Render one point as a single line-protocol line.
pub fn to_line_protocol(point: &TimeSeriesPoint) -> String {
    let mut line = escape_measurement(&point.measurement);

    let mut tags: Vec<_> = point.tags.iter().collect();
    tags.sort_by_key(|(k, _)| k.as_str());
    for (k, v) in tags {
        line.push(',');
        line.push_str(&escape_tag_value(k));
        line.push('=');
        line.push_str(&escape_tag_value(v));
    }

    line.push(' ');
    let mut fields: Vec<_> = point.fields.iter().collect();
    fields.sort_by_key(|(k, _)| k.as_str());
    let rendered: Vec<String> = fields
        .into_iter()
        .map(|(k, v)| format!("{}={}i", escape_tag_value(k), v))
        .collect();
    line.push_str(&rendered.join(","));

    line.push(' ');
    line.push_str(&point.time.timestamp_nanos_opt().unwrap_or(0).to_string());
    line
}

#[async_trait]
impl TimeSeriesStore for InfluxTimeSeriesStore {
    async fn write(&self, point: TimeSeriesPoint) -> anyhow::Result<()> {
        let body = to_line_protocol(&point);
        let resp = self
            .client
            .post(&self.write_url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => Ok(()),
            Ok(r) => {
                let status = r.status();
                error!(%status, "InfluxDB write rejected point");
                anyhow::bail!("InfluxDB write returned {status}")
            }
            Err(e) => {
                error!(error = %e, "InfluxDB write failed");
                Err(e.into())
            }
        }
    }
}
