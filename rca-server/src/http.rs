//! RCA Agent HTTP API and single-page UI
//!
//! Axum-based HTTP server that serves the analyzer page and a small JSON API.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - GET  /                    : single-page analyzer UI
//! - GET  /health              : health check with DB and LLM status
//! - GET  /version             : server version info
//! - POST /analyze             : analyze a log and store the result
//! - GET  /history             : list stored analyses
//! - GET  /history/:id         : fetch one stored analysis
//! - POST /history/:id/feedback: rate a stored analysis

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use rca_core::protocol::{RcaRequest, RcaResponse, PROTOCOL};
use rca_core::ErrorKind;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router::{self, AppContext};

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/analyze", post(analyze_handler))
        .route("/history", get(history_handler))
        .route("/history/:id", get(record_handler))
        .route("/history/:id/feedback", post(feedback_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    ctx: AppContext,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);
    let app = build_router(Arc::new(ctx));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("RCA Agent listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub log: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub newest_first: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub helpful: bool,
    pub comment: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn into_value(self) -> serde_json::Value {
        serde_json::json!({"error": self.error, "status": self.status})
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    let response = router::handle_request(RcaRequest::Health, ctx).await;
    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
            }
            (StatusCode::OK, data)
        }
        Err((status, body)) => (
            status,
            serde_json::json!({
                "status": "unhealthy",
                "error": body["error"],
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL,
    })
}

/// Inner analyze: validates the body, runs the pipeline and stores the record.
pub async fn analyze_inner(
    ctx: &AppContext,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    let log = match req.log {
        Some(l) if !l.trim().is_empty() => l,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("log field is required").into_value(),
            );
        }
    };

    let start = Instant::now();
    let response = router::handle_request(RcaRequest::Analyze { log }, ctx).await;
    let took_ms = start.elapsed().as_millis() as u64;

    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
            }
            (StatusCode::OK, data)
        }
        Err(err) => err,
    }
}

pub async fn history_inner(
    ctx: &AppContext,
    params: HistoryParams,
) -> (StatusCode, serde_json::Value) {
    let request = RcaRequest::History {
        limit: params.limit,
        offset: params.offset,
        newest_first: params.newest_first,
    };
    into_http(router::handle_request(request, ctx).await)
}

pub async fn record_inner(ctx: &AppContext, id: i64) -> (StatusCode, serde_json::Value) {
    into_http(router::handle_request(RcaRequest::Get { id }, ctx).await)
}

pub async fn feedback_inner(
    ctx: &AppContext,
    id: i64,
    req: FeedbackRequest,
) -> (StatusCode, serde_json::Value) {
    let request = RcaRequest::Feedback {
        id,
        helpful: req.helpful,
        comment: req.comment,
    };
    into_http(router::handle_request(request, ctx).await)
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

pub async fn health_handler(State(state): State<Arc<AppContext>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn analyze_handler(
    State(state): State<Arc<AppContext>>,
    body: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (status, body) = analyze_inner(&state, req).await;
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<AppContext>>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (status, body) = history_inner(&state, params).await;
    (status, Json(body))
}

pub async fn record_handler(
    State(state): State<Arc<AppContext>>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> impl IntoResponse {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (status, body) = record_inner(&state, id).await;
    (status, Json(body))
}

pub async fn feedback_handler(
    State(state): State<Arc<AppContext>>,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<FeedbackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Path(id) = match id {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let Json(req) = match body {
        Ok(b) => b,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (status, body) = feedback_inner(&state, id, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Upstream) => StatusCode::BAD_GATEWAY,
        Some(ErrorKind::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an `RcaResponse` into an HTTP body value, or a status plus error body.
pub fn response_to_http(
    response: RcaResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, serde_json::Value)> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        let status = status_for(response.error_kind);
        let message = response.error.unwrap_or_else(|| "unknown error".to_string());
        Err((status, ErrorResponse::new(message).into_value()))
    }
}

/// Extractor rejections get the same JSON error body as every other failure.
fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message).into_value()),
    )
}

fn into_http(response: RcaResponse) -> (StatusCode, serde_json::Value) {
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err(err) => err,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
