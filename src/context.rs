//! Shared handle bundle: the core needs a handle to each sink, not a
//! growing argument list. Every receiver worker clones this cheaply
//! (all fields are already `Arc`-backed) instead of threading five
//! separate parameters through the decode/classify/emit chain.

use std::sync::Arc;

use crate::dns::HostnameResolver;
use crate::pubsub::Publisher;
use crate::store::{KeyedStore, TimeSeriesStore};
use crate::template_cache::TemplateCache;

#[derive(Clone)]
pub struct CoreContext {
    pub keyed_store: Arc<dyn KeyedStore>,
    pub ts_store: Arc<dyn TimeSeriesStore>,
    pub dns: Arc<HostnameResolver>,
    pub publisher: Arc<Publisher>,
    pub templates: Arc<TemplateCache>,
}

impl CoreContext {
    pub fn new(
        keyed_store: Arc<dyn KeyedStore>,
        ts_store: Arc<dyn TimeSeriesStore>,
        dns: Arc<HostnameResolver>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            keyed_store,
            ts_store,
            dns,
            publisher,
            templates: Arc::new(TemplateCache::new()),
        }
    }
}
