//! Prometheus text exposition (format 0.0.4).
//!
//! Collectors describe their series with [`SeriesDesc`] and hand back
//! [`MetricFamily`] values per scrape; [`encode_text`] renders them. Label
//! values in a [`Sample`] are positional and line up with the descriptor's
//! `label_names`.

use std::fmt::Write;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// Static description of one series: name, help, type and label dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDesc {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl SeriesDesc {
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: Vec::new(),
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Gauge)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Counter)
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.label_names = labels.iter().map(|l| l.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(label_values: Vec<String>, value: f64) -> Self {
        Self { label_values, value }
    }
}

/// All samples of one series for one scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub desc: SeriesDesc,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    pub fn new(desc: SeriesDesc) -> Self {
        Self {
            desc,
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, label_values: Vec<String>, value: f64) {
        self.samples.push(Sample::new(label_values, value));
    }

    /// Value for the sample whose label values equal `labels`.
    pub fn value_of(&self, labels: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.label_values.iter().map(String::as_str).eq(labels.iter().copied()))
            .map(|s| s.value)
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, not starting with `__` (reserved).
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

/// Render families in Prometheus text format. Families without samples are
/// skipped.
pub fn encode_text(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for f in families.iter().filter(|f| !f.samples.is_empty()) {
        let name = &f.desc.name;
        let _ = writeln!(out, "# HELP {} {}", name, escape_help(&f.desc.help));
        let _ = writeln!(out, "# TYPE {} {}", name, f.desc.kind.as_str());
        for s in &f.samples {
            let label_str = f
                .desc
                .label_names
                .iter()
                .zip(&s.label_values)
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            if label_str.is_empty() {
                let _ = writeln!(out, "{} {}", name, format_value(s.value));
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", name, label_str, format_value(s.value));
            }
        }
    }
    out
}
