//! Hostname Resolver — reverse DNS with a TTL-bounded cache that lives
//! in the keyed store, not in this process's memory.
//!
//! The actual PTR lookup is abstracted behind [`ReverseResolver`] so the
//! cache/timeout/never-block-the-fast-path logic can be tested without a
//! live resolver — the real implementation wraps `hickory-resolver`.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use crate::store::KeyedStore;

const HOSTNAME_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Hostname(String),
    Failed,
    TimedOut,
}

#[async_trait]
pub trait ReverseResolver: Send + Sync {
    async fn reverse_lookup(&self, addr: Ipv4Addr) -> LookupOutcome;
}

/// `hickory-resolver` wrapped with the per-lookup timeout from
/// `CollectorConfig::dns_timeout_secs`. Dropping the future on timeout
/// cancels the in-flight query — no lingering background work.
pub struct HickoryReverseResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryReverseResolver {
    pub fn from_system_conf(timeout: Duration) -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        Ok(Self { resolver, timeout })
    }
}

#[async_trait]
impl ReverseResolver for HickoryReverseResolver {
    async fn reverse_lookup(&self, addr: Ipv4Addr) -> LookupOutcome {
        let result = tokio::time::timeout(
            self.timeout,
            self.resolver.reverse_lookup(std::net::IpAddr::V4(addr)),
        )
        .await;

        match result {
            Ok(Ok(lookup)) => match lookup.iter().next() {
                Some(name) => LookupOutcome::Hostname(name.to_string().trim_end_matches('.').to_string()),
                None => LookupOutcome::Failed,
            },
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "reverse DNS lookup failed");
                LookupOutcome::Failed
            }
            Err(_) => {
                debug!(%addr, "reverse DNS lookup timed out");
                LookupOutcome::TimedOut
            }
        }
    }
}

pub struct HostnameResolver {
    store: Arc<dyn KeyedStore>,
    resolver: Arc<dyn ReverseResolver>,
}

impl HostnameResolver {
    pub fn new(store: Arc<dyn KeyedStore>, resolver: Arc<dyn ReverseResolver>) -> Self {
        Self { store, resolver }
    }

    /// Resolve `ip` to a hostname, consulting/populating the shared
    /// cache:
    /// - cache hit → return cached string
    /// - cache miss → resolve, cache the result (or the IP itself on
    ///   failure) for 3600s, and return it
    /// - timeout → return the IP string, do not cache
    pub async fn resolve(&self, ip: Ipv4Addr) -> String {
        let cache_key = format!("hostname:{ip}");

        if let Ok(Some(cached)) = self.store.get(&cache_key).await {
            return cached;
        }

        match self.resolver.reverse_lookup(ip).await {
            LookupOutcome::Hostname(name) => {
                let _ = self
                    .store
                    .set_with_ttl(&cache_key, &name, HOSTNAME_TTL_SECS)
                    .await;
                name
            }
            LookupOutcome::Failed => {
                let ip_str = ip.to_string();
                let _ = self
                    .store
                    .set_with_ttl(&cache_key, &ip_str, HOSTNAME_TTL_SECS)
                    .await;
                ip_str
            }
            LookupOutcome::TimedOut => ip.to_string(),
        }
    }
}
