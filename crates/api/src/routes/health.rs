//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Process liveness plus whether the message store is reachable.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };

    Json(json!({
        "status": "ok",
        "service": "pantry-courier-api",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
