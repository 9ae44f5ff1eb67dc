//! Upstream stats source.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use lmq_exporter_core::error::{ExporterError, Result};

/// Source of raw `/stats` bodies.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Where the stats come from (for logs).
    fn uri(&self) -> &str;

    /// Fetch one full response body. Any failure to obtain a 2xx body is a
    /// `Transport` error.
    async fn fetch(&self) -> Result<Bytes>;
}

/// Parse and check an upstream URI. Only plain http(s) is supported.
pub fn parse_uri(uri: &str) -> Result<Url> {
    let url = Url::parse(uri)
        .map_err(|e| ExporterError::Config(format!("invalid upstream uri {uri:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExporterError::Config(format!(
            "unsupported upstream uri scheme {other:?} (expected http or https)"
        ))),
    }
}

fn transport(e: reqwest::Error) -> ExporterError {
    if e.is_timeout() {
        ExporterError::Transport(format!("upstream request timed out: {e}"))
    } else {
        ExporterError::Transport(e.to_string())
    }
}

/// HTTP GET against the LMQ stats endpoint.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    url: Url,
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(uri: &str, timeout: Duration) -> Result<Self> {
        let url = parse_uri(uri)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lmq-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExporterError::Config(format!("http client build failed: {e}")))?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    fn uri(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch(&self) -> Result<Bytes> {
        let resp = self.client.get(self.url.clone()).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExporterError::Transport(format!("upstream returned {status}")));
        }
        resp.bytes().await.map_err(transport)
    }
}
