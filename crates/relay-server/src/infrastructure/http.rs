//! HTTP adapter: axum routes over [`SessionService`].
//!
//! | Method | Path                | Success                         | Failure            |
//! |--------|---------------------|---------------------------------|--------------------|
//! | POST   | `/connect`          | `{status}`                      | 500                |
//! | POST   | `/reset-connection` | `{status, message}`             | 500                |
//! | GET    | `/status`           | `{status, hasQrCode}`           |                    |
//! | GET    | `/qrcode`           | `{qrCode, status}`              | 404 `{error, status}` |
//! | POST   | `/send-message`     | `{success, result}`             | 400 / 500          |
//! | POST   | `/disconnect`       | `{status}`                      | 500                |
//! | GET    | `/health`           | `{status: "ok"}`                |                    |
//!
//! Every core failure becomes 500 `{error: <summary>, message: <detail>}`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_session::{ServiceError, SessionService};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::domain::messages::{
    ErrorReply, QrUnavailableReply, ResetReply, SendMessageReply, SendMessageRequest, StatusReply,
    INVALID_BODY, MISSING_FIELDS, MISSING_FIELDS_DETAIL, QR_NOT_AVAILABLE, RESET_MESSAGE,
};

type AppState = Arc<SessionService>;

// ── Router ────────────────────────────────────────────────────────────────────

/// Builds the API router.  Shared by `main` and the route tests.
pub fn build_router(service: Arc<SessionService>) -> Router {
    Router::new()
        .route("/connect", post(connect_handler))
        .route("/reset-connection", post(reset_handler))
        .route("/status", get(status_handler))
        .route("/qrcode", get(qrcode_handler))
        .route("/send-message", post(send_message_handler))
        .route("/disconnect", post(disconnect_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Binds `addr` and serves `router` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

// ── Error mapping ─────────────────────────────────────────────────────────────

struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{}", self.0);
        let body = ErrorReply::new(self.0.summary(), self.0.detail());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

fn bad_request(error: &str, message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorReply::new(error, message))).into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn connect_handler(State(service): State<AppState>) -> Result<Json<StatusReply>, ApiError> {
    let outcome = service.connect().await?;
    Ok(Json(StatusReply {
        status: outcome.status().to_string(),
    }))
}

async fn reset_handler(State(service): State<AppState>) -> Result<Json<ResetReply>, ApiError> {
    let outcome = service.reset_connection().await?;
    Ok(Json(ResetReply {
        status: outcome.status().to_string(),
        message: RESET_MESSAGE.to_string(),
    }))
}

async fn status_handler(State(service): State<AppState>) -> impl IntoResponse {
    Json(service.status())
}

async fn qrcode_handler(State(service): State<AppState>) -> Response {
    let report = service.pairing_code();
    if report.qr_code.is_some() {
        return Json(report).into_response();
    }
    let body = QrUnavailableReply {
        error: QR_NOT_AVAILABLE.to_string(),
        status: report.status,
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn send_message_handler(
    State(service): State<AppState>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return Ok(bad_request(INVALID_BODY, rejection.body_text())),
    };
    let Some((number, message)) = request.required_fields() else {
        return Ok(bad_request(MISSING_FIELDS, MISSING_FIELDS_DETAIL));
    };

    let receipt = service.send_message(number, message).await?;
    Ok(Json(SendMessageReply {
        success: true,
        result: receipt,
    })
    .into_response())
}

async fn disconnect_handler(
    State(service): State<AppState>,
) -> Result<Json<StatusReply>, ApiError> {
    let outcome = service.disconnect().await?;
    Ok(Json(StatusReply {
        status: outcome.status().to_string(),
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
