//! Axum router wiring.
//!
//! The outermost layer is the recovery boundary: a panic anywhere in request
//! handling becomes a logged 500, and the server keeps serving.

use std::any::Any;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::{app_state::AppState, obs::ExporterMetrics, ops};

pub fn build_router(state: AppState) -> Router {
    let metrics = state.metrics();
    let metrics_path = state.cfg().web.metrics_path.clone();

    Router::new()
        .route("/", get(ops::landing))
        .route("/healthz", get(ops::healthz))
        .route(&metrics_path, get(ops::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(
            move |err: Box<dyn Any + Send + 'static>| recover(&metrics, err),
        ))
}

fn recover(metrics: &Arc<ExporterMetrics>, err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "request handler panicked");
    metrics.record_panic();

    (StatusCode::INTERNAL_SERVER_ERROR, "internal error\n").into_response()
}
