//! Manual dispatch trigger.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use pantry_common::error::AppError;
use pantry_dispatcher::dispatch::{Dispatcher, TickSummary};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/dispatch/tick", post(trigger_tick))
}

/// POST /api/dispatch/tick — Run one dispatch tick immediately.
async fn trigger_tick(State(state): State<AppState>) -> Result<Json<TickSummary>, AppError> {
    let mut dispatcher = Dispatcher::new(
        state.pool.clone(),
        state.sms.clone(),
        state.config.dispatch_batch_size,
        state.config.dispatch_interval_secs,
    );

    let summary = dispatcher
        .tick()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(
        due = summary.due,
        sent = summary.sent,
        "Manual dispatch tick completed"
    );
    Ok(Json(summary))
}
