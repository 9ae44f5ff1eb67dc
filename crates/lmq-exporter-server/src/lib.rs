//! lmq-exporter server library entry.
//!
//! Wires the upstream client, the stats collector, the metrics registry and
//! the HTTP surface into one exporter. Consumed by the binary (`main.rs`) and
//! by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod app_state;
pub mod collector;
pub mod config;
pub mod obs;
pub mod ops;
pub mod router;
