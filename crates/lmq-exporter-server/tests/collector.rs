//! StatsCollector behaviour against a scripted upstream.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;

use lmq_exporter_core::error::{ExporterError, Result};
use lmq_exporter_core::protocol::exposition::{MetricFamily, MetricKind};
use lmq_exporter_server::collector::{CollectorOptions, StatsCollector, Upstream};
use lmq_exporter_server::obs::{Collector, ExporterMetrics};

const Q1: &str = r#"{"Queues":{"q1":{"Size":5,"Memory":1024,"Stats":{"Push":{"Count":10},"Pull":{"Count":3},"Retention":{"Min":0.1,"Max":9.9,"arithmetic_mean":2.2,"Median":1.5}}}}}"#;
const Q1_Q2: &str = r#"{"Queues":{"q1":{"Size":1,"Memory":10},"q2":{"Size":2,"Memory":20,"Stats":{"Push":{"Count":7}}}}}"#;
const Q1_ONLY: &str = r#"{"Queues":{"q1":{"Size":9,"Memory":90}}}"#;

#[derive(Clone)]
enum Reply {
    Body(&'static str),
    Fail,
}

struct ScriptedUpstream {
    reply: Mutex<Reply>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedUpstream {
    fn new(reply: Reply) -> Arc<Self> {
        Self::with_delay(reply, Duration::ZERO)
    }

    fn with_delay(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    fn uri(&self) -> &str {
        "scripted://stats"
    }

    async fn fetch(&self) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Body(s) => Ok(Bytes::from_static(s.as_bytes())),
            Reply::Fail => Err(ExporterError::Transport("connection refused".into())),
        }
    }
}

fn collector_with(
    upstream: Arc<ScriptedUpstream>,
    opts: CollectorOptions,
) -> (StatsCollector, Arc<ExporterMetrics>) {
    let metrics = Arc::new(ExporterMetrics::new(&opts.namespace));
    let c = StatsCollector::new(upstream, opts, Arc::clone(&metrics));
    (c, metrics)
}

fn collector(upstream: Arc<ScriptedUpstream>) -> (StatsCollector, Arc<ExporterMetrics>) {
    collector_with(upstream, CollectorOptions::default())
}

fn value(families: &[MetricFamily], name: &str, queue: &str) -> Option<f64> {
    families
        .iter()
        .find(|f| f.desc.name == name)
        .and_then(|f| f.value_of(&[queue]))
}

async fn advance(d: Duration) {
    tokio::time::advance(d).await;
}

#[tokio::test(start_paused = true)]
async fn describe_is_static_and_does_not_fetch() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, _) = collector(up.clone());

    let descs = c.describe();
    let names: Vec<&str> = descs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "lmq_queue_size",
            "lmq_queue_memory_bytes",
            "lmq_queue_push",
            "lmq_queue_pull",
            "lmq_queue_retention_min",
            "lmq_queue_retention_max",
            "lmq_queue_retention_mean",
            "lmq_queue_retention_median",
        ]
    );
    for d in &descs {
        assert_eq!(d.label_names, ["queue"]);
        assert!(!d.help.is_empty());
        let expect = if d.name.ends_with("_push") || d.name.ends_with("_pull") {
            MetricKind::Counter
        } else {
            MetricKind::Gauge
        };
        assert_eq!(d.kind, expect, "{}", d.name);
    }
    assert_eq!(up.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn relabels_upstream_fields() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, metrics) = collector(up.clone());

    let fams = c.collect().await;
    assert_eq!(value(&fams, "lmq_queue_size", "q1"), Some(5.0));
    assert_eq!(value(&fams, "lmq_queue_memory_bytes", "q1"), Some(1024.0));
    assert_eq!(value(&fams, "lmq_queue_push", "q1"), Some(10.0));
    assert_eq!(value(&fams, "lmq_queue_pull", "q1"), Some(3.0));
    assert_eq!(value(&fams, "lmq_queue_retention_min", "q1"), Some(0.1));
    assert_eq!(value(&fams, "lmq_queue_retention_max", "q1"), Some(9.9));
    assert_eq!(value(&fams, "lmq_queue_retention_mean", "q1"), Some(2.2));
    assert_eq!(value(&fams, "lmq_queue_retention_median", "q1"), Some(1.5));

    assert!(metrics.is_up());
    assert_eq!(metrics.fetches("success"), 1);
}

#[tokio::test(start_paused = true)]
async fn fetches_once_per_interval() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, _) = collector(up.clone());

    for _ in 0..5 {
        c.collect().await;
    }
    advance(Duration::from_millis(4_900)).await;
    c.collect().await;
    assert_eq!(up.calls(), 1);

    advance(Duration::from_millis(200)).await;
    c.collect().await;
    c.collect().await;
    assert_eq!(up.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_fetches_every_scrape() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let opts = CollectorOptions {
        min_interval: Duration::ZERO,
        ..CollectorOptions::default()
    };
    let (c, _) = collector_with(up.clone(), opts);

    c.collect().await;
    c.collect().await;
    c.collect().await;
    assert_eq!(up.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_serves_previous_values() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, metrics) = collector(up.clone());

    let before = c.collect().await;
    advance(Duration::from_secs(6)).await;
    up.set(Reply::Fail);

    let after = c.collect().await;
    assert_eq!(up.calls(), 2);
    assert_eq!(after, before);
    assert!(!metrics.is_up());
    assert_eq!(metrics.fetches("transport"), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_body_changes_nothing() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, metrics) = collector(up.clone());

    let before = c.collect().await;
    advance(Duration::from_secs(6)).await;
    up.set(Reply::Body("not json"));

    let after = c.collect().await;
    assert_eq!(after, before);
    assert_eq!(metrics.fetches("malformed_data"), 1);

    // Expiry was not extended: the very next scrape retries upstream.
    c.collect().await;
    assert_eq!(up.calls(), 3);

    up.set(Reply::Body(Q1_ONLY));
    let recovered = c.collect().await;
    assert_eq!(up.calls(), 4);
    assert_eq!(value(&recovered, "lmq_queue_size", "q1"), Some(9.0));
    assert!(metrics.is_up());
}

#[tokio::test(start_paused = true)]
async fn first_fetch_failure_emits_no_queue_samples() {
    let up = ScriptedUpstream::new(Reply::Fail);
    let (c, _) = collector(up.clone());

    let fams = c.collect().await;
    assert_eq!(fams.len(), 8);
    assert!(fams.iter().all(|f| f.samples.is_empty()));

    c.collect().await;
    assert_eq!(up.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn vanished_queue_keeps_last_values() {
    let up = ScriptedUpstream::new(Reply::Body(Q1_Q2));
    let (c, _) = collector(up.clone());

    let first = c.collect().await;
    assert_eq!(value(&first, "lmq_queue_size", "q2"), Some(2.0));

    advance(Duration::from_secs(6)).await;
    up.set(Reply::Body(Q1_ONLY));
    let second = c.collect().await;

    assert_eq!(value(&second, "lmq_queue_size", "q1"), Some(9.0));
    assert_eq!(value(&second, "lmq_queue_memory_bytes", "q1"), Some(90.0));
    assert_eq!(value(&second, "lmq_queue_size", "q2"), Some(2.0));
    assert_eq!(value(&second, "lmq_queue_memory_bytes", "q2"), Some(20.0));
    assert_eq!(value(&second, "lmq_queue_push", "q2"), Some(7.0));
}

#[tokio::test(start_paused = true)]
async fn counters_are_set_not_incremented() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let (c, _) = collector(up.clone());

    c.collect().await;
    advance(Duration::from_secs(6)).await;
    up.set(Reply::Body(r#"{"Queues":{"q1":{"Stats":{"Push":{"Count":4}}}}}"#));

    let fams = c.collect().await;
    assert_eq!(value(&fams, "lmq_queue_push", "q1"), Some(4.0));
    assert_eq!(value(&fams, "lmq_queue_pull", "q1"), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn concurrent_scrapes_share_one_fetch() {
    let up = ScriptedUpstream::with_delay(Reply::Body(Q1), Duration::from_millis(100));
    let (c, _) = collector(up.clone());
    let c = Arc::new(c);

    let results = join_all((0..16).map(|_| {
        let c = Arc::clone(&c);
        async move { c.collect().await }
    }))
    .await;

    assert_eq!(up.calls(), 1);
    assert!(results.iter().all(|r| r == &results[0]));
    assert_eq!(value(&results[0], "lmq_queue_size", "q1"), Some(5.0));
}

#[tokio::test(start_paused = true)]
async fn concurrent_scrapes_at_expiry_observe_one_snapshot() {
    let up = ScriptedUpstream::with_delay(Reply::Body(Q1_Q2), Duration::from_millis(100));
    let (c, _) = collector(up.clone());
    let c = Arc::new(c);

    c.collect().await;
    advance(Duration::from_secs(6)).await;
    up.set(Reply::Body(Q1_ONLY));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.collect().await })
        })
        .collect();
    let mut results = Vec::new();
    for h in handles {
        results.push(h.await.unwrap());
    }

    assert_eq!(up.calls(), 2);
    for r in &results {
        assert_eq!(r, &results[0]);
        assert_eq!(value(r, "lmq_queue_size", "q1"), Some(9.0));
        assert_eq!(value(r, "lmq_queue_size", "q2"), Some(2.0));
    }
}

#[tokio::test(start_paused = true)]
async fn hung_upstream_times_out_as_transport_failure() {
    let up = ScriptedUpstream::with_delay(Reply::Body(Q1), Duration::from_secs(60));
    let opts = CollectorOptions {
        fetch_timeout: Duration::from_secs(1),
        ..CollectorOptions::default()
    };
    let (c, metrics) = collector_with(up.clone(), opts);

    let fams = c.collect().await;
    assert!(fams.iter().all(|f| f.samples.is_empty()));
    assert_eq!(metrics.fetches("transport"), 1);
    assert!(!metrics.is_up());
}

#[tokio::test(start_paused = true)]
async fn strict_mode_emits_nothing_on_failure() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let opts = CollectorOptions {
        serve_stale_on_error: false,
        ..CollectorOptions::default()
    };
    let (c, _) = collector_with(up.clone(), opts);

    assert_eq!(value(&c.collect().await, "lmq_queue_size", "q1"), Some(5.0));

    advance(Duration::from_secs(6)).await;
    up.set(Reply::Fail);
    assert!(c.collect().await.is_empty());

    // Cached values are still there once upstream recovers.
    up.set(Reply::Body(r#"{"Queues":{"other":{"Size":1}}}"#));
    let fams = c.collect().await;
    assert_eq!(value(&fams, "lmq_queue_size", "q1"), Some(5.0));
    assert_eq!(value(&fams, "lmq_queue_size", "other"), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn custom_namespace_prefixes_every_series() {
    let up = ScriptedUpstream::new(Reply::Body(Q1));
    let opts = CollectorOptions {
        namespace: "broker".into(),
        ..CollectorOptions::default()
    };
    let (c, _) = collector_with(up, opts);

    assert!(c.describe().iter().all(|d| d.name.starts_with("broker_queue_")));
    let fams = c.collect().await;
    assert_eq!(value(&fams, "broker_queue_size", "q1"), Some(5.0));
}
