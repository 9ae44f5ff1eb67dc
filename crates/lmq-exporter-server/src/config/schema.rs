use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use lmq_exporter_core::error::{ExporterError, Result};
use lmq_exporter_core::protocol::exposition::is_valid_label_name;

use crate::collector::upstream::parse_uri;
use crate::collector::CollectorOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub web: WebSection,

    #[serde(default)]
    pub collector: CollectorSection,

    #[serde(default)]
    pub upstream: UpstreamSection,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            web: WebSection::default(),
            collector: CollectorSection::default(),
            upstream: UpstreamSection::default(),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }
        self.web.validate()?;
        self.collector.validate()?;
        self.upstream.validate()?;
        Ok(())
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            namespace: self.collector.namespace.clone(),
            min_interval: self.collector.min_interval(),
            fetch_timeout: self.upstream.timeout(),
            serve_stale_on_error: self.collector.serve_stale_on_error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSection {
    /// `host:port`, or `:port` for all interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl WebSection {
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        let p = self.metrics_path.as_str();
        if !p.starts_with('/') || p == "/" || p == "/healthz" {
            return Err(ExporterError::Config(format!(
                "web.metrics_path must start with '/' and not be '/' or '/healthz' (got {p:?})"
            )));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let listen = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        listen.parse().map_err(|e| {
            ExporterError::Config(format!("web.listen must be a valid address ({:?}): {e}", self.listen))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default = "default_serve_stale_on_error")]
    pub serve_stale_on_error: bool,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            min_interval_ms: default_min_interval_ms(),
            serve_stale_on_error: default_serve_stale_on_error(),
        }
    }
}

impl CollectorSection {
    pub fn validate(&self) -> Result<()> {
        // Same charset as a label name: the namespace prefixes every metric.
        if !is_valid_label_name(&self.namespace) {
            return Err(ExporterError::Config(format!(
                "collector.namespace must match [a-zA-Z_][a-zA-Z0-9_]* (got {:?})",
                self.namespace
            )));
        }
        if self.min_interval_ms > 86_400_000 {
            return Err(ExporterError::Config(
                "collector.min_interval_ms must be at most 86400000".into(),
            ));
        }
        Ok(())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSection {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl UpstreamSection {
    pub fn validate(&self) -> Result<()> {
        parse_uri(&self.uri)?;
        if !(100..=300_000).contains(&self.timeout_ms) {
            return Err(ExporterError::Config(
                "upstream.timeout_ms must be between 100 and 300000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_listen() -> String {
    ":9001".into()
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
fn default_namespace() -> String {
    "lmq".into()
}
fn default_min_interval_ms() -> u64 {
    5000
}
fn default_serve_stale_on_error() -> bool {
    true
}
fn default_uri() -> String {
    "http://localhost:9980/stats".into()
}
fn default_timeout_ms() -> u64 {
    10000
}
