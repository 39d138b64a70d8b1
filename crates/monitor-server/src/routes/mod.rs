use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod events;
pub mod health;
pub mod monitoring;

/// Assemble every route of the service
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(monitoring::router())
        .merge(events::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
