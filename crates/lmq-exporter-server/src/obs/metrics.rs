//! Exporter self-metrics.
//!
//! Label-keyed counters and gauges backed by `DashMap`, keyed by the label
//! values in descriptor order. Gauges store `f64` bit patterns in an
//! `AtomicU64`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use lmq_exporter_core::error::ErrorKind;
use lmq_exporter_core::protocol::exposition::{MetricFamily, SeriesDesc};

use super::registry::Collector;

fn key(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|v| v.to_string()).collect()
}

fn sorted_family(desc: &SeriesDesc, mut entries: Vec<(Vec<String>, f64)>) -> MetricFamily {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let mut f = MetricFamily::new(desc.clone());
    for (labels, v) in entries {
        f.push(labels, v);
    }
    f
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[&str]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[&str], v: u64) {
        let counter = self.map.entry(key(labels)).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[&str]) -> u64 {
        self.map
            .get(&key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn collect(&self, desc: &SeriesDesc) -> MetricFamily {
        let entries = self
            .map
            .iter()
            .map(|r| (r.key().clone(), r.value().load(Ordering::Relaxed) as f64))
            .collect();
        sorted_family(desc, entries)
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<Vec<String>, AtomicU64>,
}

impl GaugeVec {
    pub fn set(&self, labels: &[&str], v: f64) {
        let gauge = self.map.entry(key(labels)).or_insert_with(|| AtomicU64::new(0));
        gauge.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.map
            .get(&key(labels))
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    fn collect(&self, desc: &SeriesDesc) -> MetricFamily {
        let entries = self
            .map
            .iter()
            .map(|r| (r.key().clone(), f64::from_bits(r.value().load(Ordering::Relaxed))))
            .collect();
        sorted_family(desc, entries)
    }
}

const FETCH_RESULTS: [&str; 3] = ["success", "transport", "malformed_data"];

/// Series describing the exporter itself rather than the queues.
pub struct ExporterMetrics {
    up_desc: SeriesDesc,
    fetches_desc: SeriesDesc,
    panics_desc: SeriesDesc,
    up: GaugeVec,
    upstream_fetches: CounterVec,
    panics: CounterVec,
}

impl ExporterMetrics {
    pub fn new(namespace: &str) -> Self {
        let upstream_fetches = CounterVec::default();
        for r in FETCH_RESULTS {
            upstream_fetches.add(&[r], 0);
        }
        let panics = CounterVec::default();
        panics.add(&[], 0);
        let up = GaugeVec::default();
        up.set(&[], 0.0);

        Self {
            up_desc: SeriesDesc::gauge(
                format!("{namespace}_up"),
                "Whether the last fetch from the LMQ stats endpoint succeeded.",
            ),
            fetches_desc: SeriesDesc::counter(
                format!("{namespace}_exporter_upstream_fetches_total"),
                "Fetches from the LMQ stats endpoint by result.",
            )
            .with_labels(&["result"]),
            panics_desc: SeriesDesc::counter(
                format!("{namespace}_exporter_panics_total"),
                "Request handler panics caught by the HTTP recovery boundary.",
            ),
            up,
            upstream_fetches,
            panics,
        }
    }

    /// Record the outcome of one upstream fetch attempt.
    pub fn record_fetch(&self, outcome: std::result::Result<(), ErrorKind>) {
        let result = match outcome {
            Ok(()) => "success",
            Err(kind) => kind.as_str(),
        };
        self.upstream_fetches.inc(&[result]);
        self.up.set(&[], if outcome.is_ok() { 1.0 } else { 0.0 });
    }

    pub fn record_panic(&self) {
        self.panics.inc(&[]);
    }

    pub fn fetches(&self, result: &str) -> u64 {
        self.upstream_fetches.get(&[result])
    }

    pub fn panics(&self) -> u64 {
        self.panics.get(&[])
    }

    pub fn is_up(&self) -> bool {
        self.up.get(&[]).is_some_and(|v| v > 0.0)
    }
}

#[async_trait]
impl Collector for ExporterMetrics {
    fn describe(&self) -> Vec<SeriesDesc> {
        vec![
            self.up_desc.clone(),
            self.fetches_desc.clone(),
            self.panics_desc.clone(),
        ]
    }

    async fn collect(&self) -> Vec<MetricFamily> {
        vec![
            self.up.collect(&self.up_desc),
            self.upstream_fetches.collect(&self.fetches_desc),
            self.panics.collect(&self.panics_desc),
        ]
    }
}
