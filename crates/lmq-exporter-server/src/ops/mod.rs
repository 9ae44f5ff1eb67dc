//! Operational HTTP endpoints.
//!
//! - `/`              : landing page
//! - `/healthz`       : liveness
//! - `<metrics_path>` : Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use lmq_exporter_core::protocol::exposition::CONTENT_TYPE;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn landing(State(state): State<AppState>) -> Html<String> {
    let path = &state.cfg().web.metrics_path;
    Html(format!(
        "<html><head><title>LMQ Exporter</title></head><body>\
         <h1>LMQ Exporter</h1><p><a href=\"{path}\">Metrics</a></p></body></html>"
    ))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.render_metrics().await;

    (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}
