//! Metrics registry and exporter self-observability.
//!
//! The registry is an explicit object owned by `AppState`; nothing here is
//! process-global. Collectors register their descriptors once and are asked
//! for fresh families on every scrape.

pub mod metrics;
pub mod registry;

pub use metrics::ExporterMetrics;
pub use registry::{Collector, Registry};
