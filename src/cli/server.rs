//! HTTP trigger endpoint
//!
//! `POST /` accepts any supported storage notification and handles it.
//! Exceptional failures answer 500 so the delivering runtime retries or
//! dead-letters the event; a loaded or job-failed event answers 200.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::{Error, Result};
use crate::event::{decode_event, CloudEventAttributes};
use crate::ingest::IngestionHandler;
use crate::types::JsonValue;

/// App state shared across handlers
#[derive(Clone)]
struct AppState {
    handler: Arc<IngestionHandler>,
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Routes, without binding a socket
pub fn router(handler: Arc<IngestionHandler>) -> Router {
    Router::new()
        .route("/", post(ingest))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { handler })
}

/// Start the HTTP server
pub async fn serve(handler: Arc<IngestionHandler>, port: u16) -> Result<()> {
    let app = router(handler);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Handle one trigger delivery
async fn ingest(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload: JsonValue = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return bad_request(&Error::from(e)),
    };

    let attrs = cloud_event_attributes(&headers);
    let event = match decode_event(&payload, Some(&attrs)) {
        Ok(event) => event,
        Err(e) => return bad_request(&e),
    };

    match state.handler.handle(&event).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({
                "record": outcome.record,
                "job_id": outcome.job.job_id,
                "destination": outcome.plan.destination.to_string(),
                "num_rows": outcome.num_rows,
            }))),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(e.to_string())),
        )
            .into_response(),
    }
}

fn bad_request(err: &Error) -> Response {
    warn!("Rejected trigger payload: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(err.to_string())),
    )
        .into_response()
}

/// Binary-mode CloudEvent attributes from `ce-*` headers
fn cloud_event_attributes(headers: &HeaderMap) -> CloudEventAttributes {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    CloudEventAttributes {
        id: header("ce-id"),
        time: header("ce-time"),
        event_type: header("ce-type"),
        source: header("ce-source"),
        subject: header("ce-subject"),
    }
}
