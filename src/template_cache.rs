//! NetFlow v9 template cache.
//!
//! Templates are keyed by `(exporter, source_id, template_id)`, owned
//! exclusively by the v9 decoder, and retained for the life of the
//! process. `DashMap` gives concurrent readers with infrequent writers
//! without any explicit lock management at call sites.

use std::net::Ipv4Addr;

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateField {
    pub field_type: u16,
    pub field_length: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub fields: Vec<TemplateField>,
}

impl Template {
    /// Sum of field lengths — the size in bytes of one record under this
    /// template.
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_length as usize).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateKey {
    pub exporter: Ipv4Addr,
    pub source_id: u32,
    pub template_id: u16,
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: DashMap<TemplateKey, Template>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a template. Most-recent-wins: re-arrival of
    /// the same key replaces the stored template.
    pub fn install(&self, key: TemplateKey, template: Template) {
        self.templates.insert(key, template);
    }

    pub fn get(&self, key: &TemplateKey) -> Option<Template> {
        self.templates.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
