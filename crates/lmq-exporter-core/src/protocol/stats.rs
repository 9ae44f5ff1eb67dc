//! Upstream `/stats` document.
//!
//! Shape:
//! `{"Queues": {"<name>": {"Size": 5, "Memory": 1024, "Stats": {"Push": {"Count": 10},
//! "Pull": {"Count": 3}, "Retention": {"Min": 0.1, "Max": 9.9, "arithmetic_mean": 2.2,
//! "Median": 1.5}}}}}`
//!
//! Decoding is lenient about absence and strict about types: unknown fields
//! are ignored, missing or `null` fields decode as zero, lower-case field
//! names are accepted, but a string where a number belongs is an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::error::{ExporterError, Result};

fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn queues<'de, D>(d: D) -> std::result::Result<BTreeMap<String, QueueStat>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<QueueStat>>> = Option::deserialize(d)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, q)| (name, q.unwrap_or_default()))
        .collect())
}

/// One parsed response: queue name -> stats.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpstreamSnapshot {
    #[serde(rename = "Queues", alias = "queues", default, deserialize_with = "queues")]
    pub queues: BTreeMap<String, QueueStat>,
}

impl UpstreamSnapshot {
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueStat {
    #[serde(rename = "Size", alias = "size", default, deserialize_with = "null_as_default")]
    pub size: i64,
    #[serde(rename = "Memory", alias = "memory", default, deserialize_with = "null_as_default")]
    pub memory: i64,
    #[serde(rename = "Stats", alias = "stats", default, deserialize_with = "null_as_default")]
    pub stats: QueueCounters,
}

impl QueueStat {
    pub fn memory_bytes(&self) -> i64 {
        self.memory
    }

    pub fn push_count(&self) -> i64 {
        self.stats.push.count
    }

    pub fn pull_count(&self) -> i64 {
        self.stats.pull.count
    }

    pub fn retention(&self) -> &RetentionStat {
        &self.stats.retention
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueCounters {
    #[serde(rename = "Push", alias = "push", default, deserialize_with = "null_as_default")]
    pub push: CountStat,
    #[serde(rename = "Pull", alias = "pull", default, deserialize_with = "null_as_default")]
    pub pull: CountStat,
    #[serde(rename = "Retention", alias = "retention", default, deserialize_with = "null_as_default")]
    pub retention: RetentionStat,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CountStat {
    #[serde(rename = "Count", alias = "count", default, deserialize_with = "null_as_default")]
    pub count: i64,
}

/// Retention time summary in seconds, computed by upstream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RetentionStat {
    #[serde(rename = "Min", alias = "min", default, deserialize_with = "null_as_default")]
    pub min: f64,
    #[serde(rename = "Max", alias = "max", default, deserialize_with = "null_as_default")]
    pub max: f64,
    #[serde(rename = "arithmetic_mean", default, deserialize_with = "null_as_default")]
    pub mean: f64,
    #[serde(rename = "Median", alias = "median", default, deserialize_with = "null_as_default")]
    pub median: f64,
}

/// Decode a response body. A top-level `null` is an empty snapshot.
///
/// Keys match only the upstream spelling or its lower-case alias, and a body
/// carrying both (`Size` and `size`) is rejected as a duplicate field rather
/// than letting the last one win. LMQ emits one spelling per key.
pub fn parse_snapshot(body: &[u8]) -> Result<UpstreamSnapshot> {
    let snap: Option<UpstreamSnapshot> = serde_json::from_slice(body)
        .map_err(|e| ExporterError::MalformedData(format!("invalid stats json: {e}")))?;
    Ok(snap.unwrap_or_default())
}
