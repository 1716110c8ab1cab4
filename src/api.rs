//! REST API Server for document analysis
//!
//! Exposes the analysis flow via HTTP endpoints
//! Integrates with frontend UI

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::encoder::{UploadCandidate, MAX_UPLOAD_BYTES};
use crate::error::AnalysisError;
use crate::flow::AnalysisFlow;
use crate::models::{AnalysisSession, AnalysisStatus};
use crate::profile::{ProfileStore, UserProfile};

/// Header carrying the original file name of a raw upload
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(status: StatusCode, data: T) -> ApiResult {
    (status, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: impl Into<String>) -> ApiResult {
    (status, Json(ApiResponse::error(message.into())))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub flow: AnalysisFlow,
    pub profiles: Arc<dyn ProfileStore>,
}

/// =============================
/// Session View
/// =============================

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub status: AnalysisStatus,
    pub progress: u8,
    pub stage: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    pub attempt_id: Option<Uuid>,
    pub result_id: Option<Uuid>,
    pub file_name: Option<String>,
}

impl From<&AnalysisSession> for SessionView {
    fn from(session: &AnalysisSession) -> Self {
        Self {
            status: session.status,
            progress: session.progress,
            stage: session.stage().map(|s| s.to_string()),
            error: session.error_reason.clone(),
            error_kind: session.error_kind.clone(),
            attempt_id: session.attempt_id,
            result_id: session.result.as_ref().map(|r| r.id),
            file_name: session.result.as_ref().map(|r| r.file_name.clone()),
        }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Analysis Endpoints
/// =============================

async fn get_session(State(state): State<ApiState>) -> ApiResult {
    let session = state.flow.session();
    ok(StatusCode::OK, SessionView::from(&session))
}

async fn analyze(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> ApiResult {
    // Oversized bodies surface here as 413
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Upload body rejected: {}", rejection.body_text());
            return fail(rejection.status(), rejection.body_text());
        }
    };

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("document")
        .to_string();

    info!(file = %file_name, content_type = %mime, size_bytes = body.len(), "Received analysis request");

    let candidate = match UploadCandidate::from_bytes(file_name, mime, body.to_vec()) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!("Upload rejected: {}", e);
            return fail(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let jurisdiction = match state.profiles.load().await {
        Ok(profile) => profile.and_then(|p| p.jurisdiction().map(str::to_string)),
        Err(e) => {
            warn!("Profile unavailable, using default jurisdiction: {}", e);
            None
        }
    };
    match state.flow.submit_with_jurisdiction(candidate, jurisdiction) {
        Ok(attempt_id) => ok(
            StatusCode::ACCEPTED,
            serde_json::json!({ "attempt_id": attempt_id }),
        ),
        Err(e @ AnalysisError::AnalysisInFlight) => fail(StatusCode::CONFLICT, e.to_string()),
        Err(e) => fail(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn reset(State(state): State<ApiState>) -> ApiResult {
    state.flow.reset();
    ok(StatusCode::OK, SessionView::from(&state.flow.session()))
}

async fn get_report(State(state): State<ApiState>) -> ApiResult {
    match state.flow.report() {
        Some(report) => ok(StatusCode::OK, report),
        None => fail(StatusCode::NOT_FOUND, "No completed analysis"),
    }
}

/// =============================
/// Profile Endpoints
/// =============================

async fn get_profile(State(state): State<ApiState>) -> ApiResult {
    match state.profiles.load().await {
        Ok(profile) => ok(
            StatusCode::OK,
            profile.unwrap_or_else(UserProfile::default_profile),
        ),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn put_profile(
    State(state): State<ApiState>,
    Json(profile): Json<UserProfile>,
) -> ApiResult {
    match state.profiles.save(&profile).await {
        Ok(saved) => ok(StatusCode::OK, saved),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(get_session))
        .route("/api/analyze", post(analyze))
        .route("/api/reset", post(reset))
        .route("/api/report", get(get_report))
        .route("/api/profile", get(get_profile).put(put_profile))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + 64 * 1024))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
