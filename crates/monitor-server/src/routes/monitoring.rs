//! Start, stop and inspect the agent monitor

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use xsi_monitor_core::{MonitorStatus, StartOutcome};

use crate::error::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<MonitorStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/monitoring/start", post(start_monitoring))
        .route("/monitoring/stop", post(stop_monitoring))
        .route("/monitoring/status", get(monitoring_status))
}

/// Map a start outcome onto the HTTP answer
pub fn start_response(outcome: StartOutcome) -> (StatusCode, Json<MessageResponse>) {
    let (status, message) = match outcome {
        StartOutcome::Started => (
            StatusCode::OK,
            "Agent monitoring started successfully".to_string(),
        ),
        StartOutcome::AlreadyRunning => (
            StatusCode::OK,
            "Agent monitoring is already running".to_string(),
        ),
        StartOutcome::InvalidCredential => (
            StatusCode::FORBIDDEN,
            "Invalid or expired admin token".to_string(),
        ),
        StartOutcome::Failed(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to initiate agent monitoring: {reason}"),
        ),
    };
    (status, Json(MessageResponse::new(message)))
}

pub async fn start_monitoring(State(state): State<AppState>) -> impl IntoResponse {
    start_response(state.supervisor.start_monitoring().await)
}

pub async fn stop_monitoring(State(state): State<AppState>) -> impl IntoResponse {
    let message = if state.supervisor.stop().await {
        "Agent monitoring stopped"
    } else {
        "Agent monitoring was not running"
    };
    Json(MessageResponse::new(message))
}

pub async fn monitoring_status(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.supervisor.status().await;
    Json(StatusResponse {
        running: state.supervisor.is_running().await,
        session,
    })
}
