//! Shared error type across lmq-exporter crates.

use thiserror::Error;

/// Stable error classification.
///
/// Used as the `result` label of the fetch counter, so the strings must not
/// change once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream unreachable, non-success status, or timeout.
    Transport,
    /// Upstream body is not the expected JSON document.
    MalformedData,
    /// Invalid configuration (startup only).
    Config,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// String representation used in labels and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::MalformedData => "malformed_data",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed data: {0}")]
    MalformedData(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ExporterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExporterError::Transport(_) => ErrorKind::Transport,
            ExporterError::MalformedData(_) => ErrorKind::MalformedData,
            ExporterError::Config(_) => ErrorKind::Config,
            ExporterError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Transport and data errors are expected at runtime and only cost one
    /// refresh cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::MalformedData)
    }
}
