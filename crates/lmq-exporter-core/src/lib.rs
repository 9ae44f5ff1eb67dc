//! lmq-exporter core: upstream document model, exposition primitives, and
//! the shared error type.
//!
//! This crate carries no transport or runtime dependencies. The server crate
//! owns HTTP (both the upstream client and the scrape endpoint); everything
//! here is plain data and pure functions so it can be tested in isolation.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed upstream input must surface as `ExporterError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, ExporterError, Result};
