//! HTTP API gateway for SupportDesk.
//!
//! Endpoints:
//! - `POST /support-query`: run the support pipeline for one question
//! - `GET /health`: liveness plus knowledge-store status
//!
//! Built on Axum. Every pipeline failure is reported as `500` with a
//! `{"detail": ...}` body.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use supportdesk_agent::{SupportPipeline, SupportQuery, SupportResponse};
use supportdesk_config::GatewayConfig;
use supportdesk_core::knowledge::KnowledgeStore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Request body size cap.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: SupportPipeline,
    pub store: Arc<dyn KnowledgeStore>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS for browser clients (GET/POST, JSON bodies)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/support-query", post(support_query_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server; returns after Ctrl-C.
pub async fn start(
    config: &GatewayConfig,
    state: GatewayState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(Arc::new(state));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

// --- Errors ---

/// A failure reported to the client as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<usize>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let (status, chunks) = match state.store.count().await {
        Ok(n) => ("ok", Some(n)),
        Err(e) => {
            warn!(error = %e, "Knowledge store unreachable during health check");
            ("degraded", None)
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.name().to_string(),
        chunks,
    })
}

async fn support_query_handler(
    State(state): State<SharedState>,
    Json(body): Json<SupportQuery>,
) -> Result<Json<SupportResponse>, ApiError> {
    info!(query_len = body.query.len(), "Support query received");

    match state.pipeline.answer(&body.query).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!(stage = %e.stage, error = %e, "Support query failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}
