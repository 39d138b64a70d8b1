//! HTTP push channel
//!
//! The platform (or a relay subscribed on our behalf) posts each event
//! document here as JSON. Accepted envelopes are queued for the monitoring
//! loop; nothing is processed inline.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::debug;
use xsi_monitor_core::Envelope;

use crate::error::{Result, ServerError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/xsi/events", post(receive_event))
}

pub async fn receive_event(State(state): State<AppState>, body: Bytes) -> Result<StatusCode> {
    let envelope = Envelope::from_slice(&body)
        .map_err(|e| ServerError::bad_request(format!("Invalid event document: {e}")))?;
    debug!("Queueing pushed event ({} bytes)", body.len());
    state.push.push(envelope)?;
    Ok(StatusCode::ACCEPTED)
}
