//! HTTP handlers.
//!
//! Errors are always `{"error": code, "details"?: text}` JSON.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use skuflow_core::{ProductEvent, Sequence};

use crate::metrics::{PipelineStats, render_prometheus};
use crate::{ApiState, RequestId};

const OPENAPI_YAML: &str = include_str!("openapi.yaml");

const DOCS_HTML: &str = r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>skuflow API</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
      window.ui = SwaggerUIBundle({ url: '/openapi.yaml', dom_id: '#swagger-ui' });
    </script>
  </body>
</html>
"#;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn error_response(status: StatusCode, error: &'static str, details: Option<String>) -> Response {
    (status, Json(ErrorBody { error, details })).into_response()
}

/// Acknowledgement for an accepted event.
#[derive(Debug, Serialize)]
pub struct EventAck {
    pub status: &'static str,
    pub request_id: String,
    pub sequence: Sequence,
    pub product_id: String,
    pub received_at: String,
    pub queue_depth: usize,
    pub backlog_size: usize,
    pub worker_count: usize,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
}

// ── Events ─────────────────────────────────────────────────────

/// POST /events
pub async fn post_event(
    State(state): State<ApiState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.manager.is_shutting_down() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "shutting_down", None);
    }
    if !is_json(&headers) {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            Some("expected application/json".to_string()),
        );
    }

    let mut event: ProductEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", Some(e.to_string()));
        }
    };
    if let Err(e) = event.validate() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            Some(e.to_string()),
        );
    }

    let sequence = state.sequencer.next();
    event.sequence = sequence;
    let product_id = event.product_id.clone();
    if !state.manager.enqueue(event) {
        // Intake closed between the check above and now.
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "shutting_down", None);
    }

    let ack = EventAck {
        status: "accepted",
        request_id,
        sequence,
        product_id,
        received_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        queue_depth: state.manager.queue_depth(),
        backlog_size: state.manager.backlog_size(),
        worker_count: state.manager.worker_count(),
    };
    info!(
        request_id = %ack.request_id,
        sequence,
        product_id = %ack.product_id,
        queue_depth = ack.queue_depth,
        backlog_size = ack.backlog_size,
        worker_count = ack.worker_count,
        "event accepted"
    );
    (StatusCode::ACCEPTED, Json(ack)).into_response()
}

// ── Products ───────────────────────────────────────────────────

/// GET /products/{*id}
///
/// The id is the whole remainder of the path, slashes included.
pub async fn get_product(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    if id.is_empty() {
        return error_response(StatusCode::NOT_FOUND, "not_found", None);
    }
    match state.store().get(&id) {
        Some(product) => Json(product).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", None),
    }
}

// ── Health & metrics ───────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /debug/metrics
pub async fn debug_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    Json(PipelineStats::collect(&state))
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_prometheus(&PipelineStats::collect(&state));
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ── Docs ───────────────────────────────────────────────────────

/// GET /openapi.yaml
pub async fn openapi_document() -> impl IntoResponse {
    ([("content-type", "application/yaml")], OPENAPI_YAML)
}

/// GET /docs
pub async fn docs_page() -> Html<&'static str> {
    Html(DOCS_HTML)
}

// ── Fallbacks ──────────────────────────────────────────────────

pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", None)
}

pub async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", None)
}
