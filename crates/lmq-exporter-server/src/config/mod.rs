//! Exporter config loader (strict parsing).
//!
//! Every section is optional; a file only needs `version: 1`. `main.rs` parses
//! the file without validating, layers CLI flags on top via [`Overrides`], and
//! validates the merged result once.

pub mod schema;

use std::fs;
use std::path::Path;
use std::time::Duration;

use lmq_exporter_core::error::{ExporterError, Result};

pub use schema::{CollectorSection, ExporterConfig, UpstreamSection, WebSection};

/// Read and validate a config file.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let cfg = parse_from_file(path)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse and validate a YAML document.
pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg = parse_from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Read a config file without range checks. Unreadable files are `Internal`.
pub fn parse_from_file(path: impl AsRef<Path>) -> Result<ExporterConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        ExporterError::Internal(format!("read config {} failed: {e}", path.display()))
    })?;
    parse_from_str(&s)
}

/// Strict YAML parse only; call `validate` once overrides are applied.
pub fn parse_from_str(s: &str) -> Result<ExporterConfig> {
    serde_yaml::from_str(s).map_err(|e| ExporterError::Config(format!("invalid yaml: {e}")))
}

/// Values taken from the command line; each `Some` replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub metrics_path: Option<String>,
    pub min_interval: Option<Duration>,
    pub namespace: Option<String>,
    pub upstream_uri: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut ExporterConfig) {
        if let Some(v) = &self.listen {
            cfg.web.listen = v.clone();
        }
        if let Some(v) = &self.metrics_path {
            cfg.web.metrics_path = v.clone();
        }
        if let Some(v) = self.min_interval {
            cfg.collector.min_interval_ms = u64::try_from(v.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(v) = &self.namespace {
            cfg.collector.namespace = v.clone();
        }
        if let Some(v) = &self.upstream_uri {
            cfg.upstream.uri = v.clone();
        }
        if let Some(v) = self.timeout_ms {
            cfg.upstream.timeout_ms = v;
        }
    }
}

/// Parses a duration such as `5s`, `500ms`, `1m30s` or `1.5h`.
///
/// Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num_str, tail) = rest.split_at(num_len);
        let value: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid duration '{s}': expected a number"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let secs_per_unit = match unit {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("invalid duration '{s}': missing unit")),
            other => return Err(format!("invalid duration '{s}': unknown unit '{other}'")),
        };
        total += value * secs_per_unit;
        rest = next;
    }

    Duration::try_from_secs_f64(total).map_err(|e| format!("invalid duration '{s}': {e}"))
}
