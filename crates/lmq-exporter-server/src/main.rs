//! lmq_exporter
//!
//! Polls the LMQ `/stats` endpoint on scrape (at most once per
//! `--collector.min-interval`) and serves the values as Prometheus metrics.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use lmq_exporter_core::error::{ExporterError, Result};
use lmq_exporter_server::{app_state, config, router};

#[derive(Parser)]
#[command(name = "lmq_exporter", about = "Prometheus exporter for LMQ queue statistics", version)]
struct Args {
    /// YAML config file. Flags below override its values.
    #[arg(long, env = "LMQ_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Address on which to expose metrics (default ":9001").
    #[arg(long = "web.listen-address", env = "LMQ_EXPORTER_LISTEN")]
    listen_address: Option<String>,

    /// Path under which to expose metrics (default "/metrics").
    #[arg(long = "web.metrics-path")]
    metrics_path: Option<String>,

    /// Minimum interval between upstream fetches, e.g. "5s" or "500ms" (default 5s).
    #[arg(long = "collector.min-interval", value_parser = config::parse_duration)]
    min_interval: Option<Duration>,

    /// Metric name prefix (default "lmq").
    #[arg(long = "collector.namespace")]
    namespace: Option<String>,

    /// LMQ stats URI (default "http://localhost:9980/stats").
    #[arg(long = "lmq.uri", env = "LMQ_URI")]
    lmq_uri: Option<String>,

    /// Upstream request timeout in milliseconds (default 10000).
    #[arg(long = "lmq.timeout-ms")]
    timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log.level", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> config::Overrides {
        config::Overrides {
            listen: self.listen_address.clone(),
            metrics_path: self.metrics_path.clone(),
            min_interval: self.min_interval,
            namespace: self.namespace.clone(),
            upstream_uri: self.lmq_uri.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run(args).await {
        tracing::error!(kind = e.kind().as_str(), error = %e, "lmq_exporter failed to start");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => config::parse_from_file(path)?,
        None => config::ExporterConfig::default(),
    };
    args.overrides().apply(&mut cfg);
    cfg.validate()?;

    let listen = cfg.web.socket_addr()?;
    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ExporterError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "starting lmq_exporter");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ExporterError::Internal(format!("server failed: {e}")))?;

    tracing::info!("lmq_exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
