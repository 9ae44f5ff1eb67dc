//! LMQ stats collector.
//!
//! Mediates between scrapes and the upstream `/stats` endpoint:
//! - refreshes at most once per `min_interval`, lazily, inside the scrape that
//!   finds the cache expired (no background task)
//! - the freshness check, fetch and update run under one async mutex, so
//!   concurrent scrapes at expiry cause exactly one upstream request
//! - failed fetches (transport or parse) keep the previous values and expiry
//! - emission works on a copy taken before the guard is released
//!
//! Queues that vanish upstream keep their last values; nothing is evicted.

pub mod upstream;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use lmq_exporter_core::error::{ExporterError, Result};
use lmq_exporter_core::protocol::exposition::{MetricFamily, MetricKind, SeriesDesc};
use lmq_exporter_core::protocol::stats::{parse_snapshot, QueueStat, UpstreamSnapshot};

use crate::obs::{Collector, ExporterMetrics};

pub use upstream::{HttpUpstream, Upstream};

const SUBSYSTEM: &str = "queue";
const QUEUE_LABEL: &str = "queue";

/// Values exposed for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueSeries {
    pub size: f64,
    pub memory_bytes: f64,
    pub push: f64,
    pub pull: f64,
    pub retention_min: f64,
    pub retention_max: f64,
    pub retention_mean: f64,
    pub retention_median: f64,
}

impl From<&QueueStat> for QueueSeries {
    fn from(q: &QueueStat) -> Self {
        let r = q.retention();
        Self {
            size: q.size as f64,
            memory_bytes: q.memory_bytes() as f64,
            push: q.push_count() as f64,
            pull: q.pull_count() as f64,
            retention_min: r.min,
            retention_max: r.max,
            retention_mean: r.mean,
            retention_median: r.median,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Series {
    Size,
    MemoryBytes,
    Push,
    Pull,
    RetentionMin,
    RetentionMax,
    RetentionMean,
    RetentionMedian,
}

impl Series {
    const ALL: [Series; 8] = [
        Series::Size,
        Series::MemoryBytes,
        Series::Push,
        Series::Pull,
        Series::RetentionMin,
        Series::RetentionMax,
        Series::RetentionMean,
        Series::RetentionMedian,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Series::Size => "size",
            Series::MemoryBytes => "memory_bytes",
            Series::Push => "push",
            Series::Pull => "pull",
            Series::RetentionMin => "retention_min",
            Series::RetentionMax => "retention_max",
            Series::RetentionMean => "retention_mean",
            Series::RetentionMedian => "retention_median",
        }
    }

    fn help(self) -> &'static str {
        match self {
            Series::Size => "Number of messages currently in the queue.",
            Series::MemoryBytes => "Used memory in bytes.",
            Series::Push => "Number of messages pushed to the queue.",
            Series::Pull => "Number of messages pulled from the queue.",
            Series::RetentionMin => "The minimum retention time in seconds.",
            Series::RetentionMax => "The maximum retention time in seconds.",
            Series::RetentionMean => "Mean time of retention times in seconds.",
            Series::RetentionMedian => "A median of retention times in seconds.",
        }
    }

    // Push/pull are upstream running totals: exposed as counters but set,
    // never incremented. An upstream restart shows up as a counter reset.
    fn kind(self) -> MetricKind {
        match self {
            Series::Push | Series::Pull => MetricKind::Counter,
            _ => MetricKind::Gauge,
        }
    }

    fn value(self, q: &QueueSeries) -> f64 {
        match self {
            Series::Size => q.size,
            Series::MemoryBytes => q.memory_bytes,
            Series::Push => q.push,
            Series::Pull => q.pull,
            Series::RetentionMin => q.retention_min,
            Series::RetentionMax => q.retention_max,
            Series::RetentionMean => q.retention_mean,
            Series::RetentionMedian => q.retention_median,
        }
    }

    fn desc(self, namespace: &str) -> SeriesDesc {
        SeriesDesc::new(
            format!("{namespace}_{SUBSYSTEM}_{}", self.suffix()),
            self.help(),
            self.kind(),
        )
        .with_labels(&[QUEUE_LABEL])
    }
}

/// Collector tuning, built from config.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Metric name prefix.
    pub namespace: String,
    /// Minimum time between upstream fetches.
    pub min_interval: Duration,
    /// Upper bound on one fetch, including the body read.
    pub fetch_timeout: Duration,
    /// On a failed refresh, emit cached values (true) or no queue series (false).
    pub serve_stale_on_error: bool,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            namespace: "lmq".into(),
            min_interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            serve_stale_on_error: true,
        }
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    /// `None` until the first successful fetch.
    valid_until: Option<Instant>,
    series_by_queue: BTreeMap<String, QueueSeries>,
}

impl CollectorState {
    fn is_fresh(&self, now: Instant) -> bool {
        self.valid_until.is_some_and(|t| now < t)
    }

    fn apply(&mut self, snap: &UpstreamSnapshot) {
        for (name, q) in &snap.queues {
            self.series_by_queue.insert(name.clone(), QueueSeries::from(q));
        }
    }
}

pub struct StatsCollector {
    upstream: Arc<dyn Upstream>,
    opts: CollectorOptions,
    metrics: Arc<ExporterMetrics>,
    descs: Vec<(Series, SeriesDesc)>,
    state: Mutex<CollectorState>,
}

impl StatsCollector {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        opts: CollectorOptions,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        let descs = Series::ALL
            .iter()
            .map(|s| (*s, s.desc(&opts.namespace)))
            .collect();
        Self {
            upstream,
            opts,
            metrics,
            descs,
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// The eight per-queue series, available before any fetch.
    pub fn describe_series(&self) -> Vec<SeriesDesc> {
        self.descs.iter().map(|(_, d)| d.clone()).collect()
    }

    /// Refresh if expired and return a consistent copy of the current values.
    /// The bool is false when a refresh was due and failed.
    pub async fn snapshot(&self) -> (bool, BTreeMap<String, QueueSeries>) {
        let mut state = self.state.lock().await;
        let ok = match self.refresh(&mut state).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    uri = %self.upstream.uri(),
                    kind = e.kind().as_str(),
                    error = %e,
                    "failed to update lmq stats; keeping previous values"
                );
                false
            }
        };
        (ok, state.series_by_queue.clone())
    }

    async fn refresh(&self, state: &mut CollectorState) -> Result<()> {
        if state.is_fresh(Instant::now()) {
            return Ok(());
        }

        let outcome = self.fetch_snapshot().await;
        self.metrics
            .record_fetch(outcome.as_ref().map(|_| ()).map_err(|e| e.kind()));
        let snap = outcome?;

        state.valid_until = Some(Instant::now() + self.opts.min_interval);
        state.apply(&snap);
        tracing::debug!(
            queues = snap.len(),
            known = state.series_by_queue.len(),
            "lmq stats refreshed"
        );
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<UpstreamSnapshot> {
        let body = tokio::time::timeout(self.opts.fetch_timeout, self.upstream.fetch())
            .await
            .map_err(|_| {
                ExporterError::Transport(format!(
                    "upstream fetch timed out after {}ms",
                    self.opts.fetch_timeout.as_millis()
                ))
            })??;
        parse_snapshot(&body)
    }

    fn families(&self, queues: &BTreeMap<String, QueueSeries>) -> Vec<MetricFamily> {
        self.descs
            .iter()
            .map(|(series, desc)| {
                let mut f = MetricFamily::new(desc.clone());
                for (name, q) in queues {
                    f.push(vec![name.clone()], series.value(q));
                }
                f
            })
            .collect()
    }
}

#[async_trait]
impl Collector for StatsCollector {
    fn describe(&self) -> Vec<SeriesDesc> {
        self.describe_series()
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        let (ok, queues) = self.snapshot().await;
        if !ok && !self.opts.serve_stale_on_error {
            return Vec::new();
        }
        self.families(&queues)
    }
}
