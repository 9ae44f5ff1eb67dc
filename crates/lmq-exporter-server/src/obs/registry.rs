use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use lmq_exporter_core::error::{ExporterError, Result};
use lmq_exporter_core::protocol::exposition::{
    is_valid_label_name, is_valid_metric_name, MetricFamily, SeriesDesc,
};

/// Something that contributes series to a scrape.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Static descriptors. Must not depend on collected data.
    fn describe(&self) -> Vec<SeriesDesc>;

    /// Current values. Failures are the collector's business: a collector
    /// that cannot produce fresh data returns what it has (or nothing).
    async fn collect(&self) -> Vec<MetricFamily>;
}

#[derive(Default)]
struct RegistryInner {
    collectors: Vec<Arc<dyn Collector>>,
    names: HashSet<String>,
}

/// Explicit collector registry.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a collector. Rejects invalid names and names already claimed
    /// by another collector.
    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let descs = collector.describe();
        let mut inner = self.write();

        let mut fresh = HashSet::with_capacity(descs.len());
        for d in &descs {
            if !is_valid_metric_name(&d.name) {
                return Err(ExporterError::Config(format!("invalid metric name: {}", d.name)));
            }
            if let Some(l) = d.label_names.iter().find(|l| !is_valid_label_name(l)) {
                return Err(ExporterError::Config(format!(
                    "invalid label name {l} on metric {}",
                    d.name
                )));
            }
            if inner.names.contains(&d.name) || !fresh.insert(d.name.clone()) {
                return Err(ExporterError::Config(format!(
                    "duplicate metric registration: {}",
                    d.name
                )));
            }
        }

        inner.names.extend(fresh);
        inner.collectors.push(collector);
        Ok(())
    }

    /// Descriptors of every registered series, sorted by name.
    pub fn describe(&self) -> Vec<SeriesDesc> {
        let mut out: Vec<SeriesDesc> = self
            .read()
            .collectors
            .iter()
            .flat_map(|c| c.describe())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Collect from every collector. Families come back sorted by name.
    pub async fn gather(&self) -> Vec<MetricFamily> {
        // Clone the handles so no lock is held across collector awaits.
        let collectors = self.read().collectors.clone();

        let mut families = Vec::new();
        for c in collectors {
            families.extend(c.collect().await);
        }
        families.sort_by(|a, b| a.desc.name.cmp(&b.desc.name));
        families
    }
}
