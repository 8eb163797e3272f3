//! Operator message routes: failure listing, retry, dismiss/restore,
//! balance re-queue, stale-unconfirmed listing.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::types::OutgoingMessage;
use pantry_store::admin::{AdminStore, FailurePage};
use pantry_store::messages::MessageStore;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/messages/failures", get(list_failures))
        .route("/api/messages/stale", get(list_stale))
        .route("/api/messages/{id}/retry", post(retry_message))
        .route("/api/messages/{id}/dismiss", post(dismiss_message))
        .route("/api/messages/{id}/restore", post(restore_message))
        .route("/api/messages/requeue-balance", post(requeue_balance))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OperatorParams {
    operator: String,
}

/// GET /api/messages/failures — Paginated failed messages, dismissed excluded.
async fn list_failures(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<FailurePage>, AppError> {
    let page = AdminStore::list_failures(
        &state.pool,
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(25),
    )
    .await?;
    Ok(Json(page))
}

/// GET /api/messages/stale — Sent messages still unconfirmed past the cutoff.
async fn list_stale(
    State(state): State<AppState>,
) -> Result<Json<Vec<OutgoingMessage>>, AppError> {
    let cutoff = Utc::now() - Duration::hours(state.config.stale_unconfirmed_hours);
    let stale = MessageStore::stale_unconfirmed(&state.pool, cutoff).await?;
    Ok(Json(stale))
}

/// POST /api/messages/:id/retry — Create a fresh record and dismiss the old one.
async fn retry_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(params): Json<OperatorParams>,
) -> Result<Json<OutgoingMessage>, AppError> {
    let replacement = AdminStore::retry(
        &state.pool,
        id,
        &params.operator,
        Utc::now(),
        Duration::minutes(state.config.retry_cooldown_minutes),
        Duration::minutes(state.config.retry_min_lead_minutes),
    )
    .await?;
    Ok(Json(replacement))
}

/// POST /api/messages/:id/dismiss — Hide a terminal message from the listing.
async fn dismiss_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(params): Json<OperatorParams>,
) -> Result<Json<OutgoingMessage>, AppError> {
    let dismissed = AdminStore::dismiss(&state.pool, id, &params.operator, Utc::now()).await?;
    Ok(Json(dismissed))
}

/// POST /api/messages/:id/restore — Undo a dismissal.
async fn restore_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OutgoingMessage>, AppError> {
    let restored = AdminStore::restore(&state.pool, id).await?;
    Ok(Json(restored))
}

/// POST /api/messages/requeue-balance — Re-queue all balance-exhausted failures.
async fn requeue_balance(
    State(state): State<AppState>,
    Json(params): Json<OperatorParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let requeued =
        AdminStore::requeue_balance_failures(&state.pool, &params.operator, Utc::now()).await?;
    Ok(Json(serde_json::json!({ "requeued": requeued })))
}
