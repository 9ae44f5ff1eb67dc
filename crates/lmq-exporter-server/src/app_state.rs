//! Shared application state for the exporter.
//!
//! Built once at startup: config -> upstream -> collector -> registry.
//! Startup errors are returned, not panicked on, so `main` can log and exit.

use std::sync::Arc;

use lmq_exporter_core::error::Result;
use lmq_exporter_core::protocol::exposition::encode_text;

use crate::collector::{HttpUpstream, StatsCollector, Upstream};
use crate::config::ExporterConfig;
use crate::obs::{Collector, ExporterMetrics, Registry};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    registry: Registry,
    metrics: Arc<ExporterMetrics>,
}

impl AppState {
    /// Build state against the configured HTTP upstream.
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        cfg.validate()?;
        let upstream = HttpUpstream::new(&cfg.upstream.uri, cfg.upstream.timeout())?;
        Self::with_upstream(cfg, Arc::new(upstream))
    }

    /// Build state against any upstream source.
    pub fn with_upstream(cfg: ExporterConfig, upstream: Arc<dyn Upstream>) -> Result<Self> {
        let metrics = Arc::new(ExporterMetrics::new(&cfg.collector.namespace));
        let collector = StatsCollector::new(
            Arc::clone(&upstream),
            cfg.collector_options(),
            Arc::clone(&metrics),
        );

        let registry = Registry::new();
        registry.register(Arc::new(collector))?;
        registry.register(Arc::clone(&metrics) as Arc<dyn Collector>)?;

        tracing::info!(
            uri = %upstream.uri(),
            min_interval_ms = cfg.collector.min_interval_ms,
            namespace = %cfg.collector.namespace,
            "lmq collector registered"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> Arc<ExporterMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// One scrape: gather every collector and render text exposition.
    pub async fn render_metrics(&self) -> String {
        encode_text(&self.registry().gather().await)
    }
}
