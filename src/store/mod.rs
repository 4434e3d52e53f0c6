//! External store interfaces the core requires: a keyed in-memory
//! store (counters, device set, hostname cache, pub/sub) and a
//! time-series store (durable flow points). Modeled as traits so the
//! collection pipeline never depends on a concrete backend.

pub mod influx;
pub mod redis_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// One durable time-series point, matching the `network_traffic`
/// measurement's tag/field layout.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesPoint {
    pub measurement: String,
    pub tags: HashMap<String, String>,
    pub fields: HashMap<String, i64>,
    pub time: DateTime<Utc>,
}

/// The keyed in-memory store: counters, device set, hostname cache,
/// pub/sub channel. Every operation is individually atomic in a
/// conforming implementation; group atomicity across a flow's several
/// writes is not required.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> anyhow::Result<()>;
    async fn incrby(&self, key: &str, delta: i64) -> anyhow::Result<i64>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()>;
    async fn hget(&self, key: &str, field: &str) -> anyhow::Result<Option<String>>;
    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()>;
    async fn scard(&self, key: &str) -> anyhow::Result<i64>;
    async fn publish(&self, channel: &str, message: &str) -> anyhow::Result<()>;
}

/// The columnar time-series store. Reads are consumed only by an
/// out-of-scope HTTP API and are not part of this trait.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn write(&self, point: TimeSeriesPoint) -> anyhow::Result<()>;
}

#[cfg(any(test, feature = "test-util"))]
/// In-memory fakes used by every test module that needs a store without
/// a live Redis/InfluxDB instance. Gated behind the `test-util` feature
/// (in addition to `cfg(test)`) so the `tests/` integration suite can
/// reach them from outside this crate.
pub mod fakes {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct FakeKeyedStore {
        pub kv: Mutex<HashMap<String, String>>,
        pub hashes: Mutex<HashMap<String, HashMap<String, String>>>,
        pub sets: Mutex<HashMap<String, HashSet<String>>>,
        pub published: Mutex<Vec<(String, String)>>,
    }

    impl FakeKeyedStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Counters share the plain string key space, matching real
        /// Redis where `INCRBY`/`GET` address the same key.
        pub async fn counter(&self, key: &str) -> i64 {
            self.kv
                .lock()
                .await
                .get(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        }

        pub async fn hash_field(&self, key: &str, field: &str) -> Option<String> {
            self.hashes
                .lock()
                .await
                .get(key)
                .and_then(|h| h.get(field).cloned())
        }

        pub async fn set_members(&self, key: &str) -> HashSet<String> {
            self.sets.lock().await.get(key).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl KeyedStore for FakeKeyedStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.kv.lock().await.get(key).cloned())
        }

        async fn set_with_ttl(&self, key: &str, value: &str, _ttl_secs: u64) -> anyhow::Result<()> {
            self.kv.lock().await.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn incrby(&self, key: &str, delta: i64) -> anyhow::Result<i64> {
            let mut kv = self.kv.lock().await;
            let raw = kv.get(key).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
            let updated = raw + delta;
            kv.insert(key.to_string(), updated.to_string());
            Ok(updated)
        }

        async fn hincrby(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64> {
            let mut hashes = self.hashes.lock().await;
            let hash = hashes.entry(key.to_string()).or_default();
            let raw = hash.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
            let updated = raw + delta;
            hash.insert(field.to_string(), updated.to_string());
            Ok(updated)
        }

        async fn hset(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()> {
            self.hashes
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
            Ok(())
        }

        async fn hget(&self, key: &str, field: &str) -> anyhow::Result<Option<String>> {
            Ok(self
                .hashes
                .lock()
                .await
                .get(key)
                .and_then(|h| h.get(field).cloned()))
        }

        async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
            self.sets
                .lock()
                .await
                .entry(key.to_string())
                .or_default()
                .insert(member.to_string());
            Ok(())
        }

        async fn scard(&self, key: &str) -> anyhow::Result<i64> {
            Ok(self.sets.lock().await.get(key).map(|s| s.len()).unwrap_or(0) as i64)
        }

        async fn publish(&self, channel: &str, message: &str) -> anyhow::Result<()> {
            self.published
                .lock()
                .await
                .push((channel.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeTimeSeriesStore {
        pub points: Mutex<Vec<TimeSeriesPoint>>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    impl FakeTimeSeriesStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl TimeSeriesStore for FakeTimeSeriesStore {
        async fn write(&self, point: TimeSeriesPoint) -> anyhow::Result<()> {
            if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
                anyhow::bail!("simulated write failure");
            }
            self.points.lock().await.push(point);
            Ok(())
        }
    }
}
