//! Top-level facade crate for lmq-exporter.
//!
//! Re-exports core types and the server library so users can depend on a single crate.

pub mod core {
    pub use lmq_exporter_core::*;
}

pub mod server {
    pub use lmq_exporter_server::*;
}
