//! Outside-hours issue reporting.
//!
//! Flags upcoming appointments whose pickup window falls outside the
//! location's opening hours, using the same filter function the dispatcher
//! consults — the two views must never disagree.

use std::collections::HashMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::types::ScheduleVersion;
use pantry_engine::eligibility::{self, EligibilityReason};
use pantry_store::schedules::ScheduleStore;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/appointments/issues", get(list_issues))
}

/// One mis-scheduled appointment.
#[derive(Debug, Serialize)]
struct AppointmentIssue {
    appointment_id: Uuid,
    location_id: Uuid,
    earliest_pickup: DateTime<Utc>,
    latest_pickup: DateTime<Utc>,
    reason: EligibilityReason,
}

/// GET /api/appointments/issues — Upcoming appointments outside opening hours.
async fn list_issues(
    State(state): State<AppState>,
) -> Result<Json<Vec<AppointmentIssue>>, AppError> {
    let appointments = ScheduleStore::upcoming_appointments(&state.pool, Utc::now()).await?;

    let mut schedules_by_location: HashMap<Uuid, Vec<ScheduleVersion>> = HashMap::new();
    let mut issues = Vec::new();

    for appointment in appointments {
        if !schedules_by_location.contains_key(&appointment.location_id) {
            let schedules =
                ScheduleStore::schedules_for_location(&state.pool, appointment.location_id).await?;
            schedules_by_location.insert(appointment.location_id, schedules);
        }
        let schedules = &schedules_by_location[&appointment.location_id];

        let eligibility = eligibility::check_pickup_window(&appointment.window(), schedules);
        if !eligibility.eligible {
            issues.push(AppointmentIssue {
                appointment_id: appointment.id,
                location_id: appointment.location_id,
                earliest_pickup: appointment.earliest_pickup,
                latest_pickup: appointment.latest_pickup,
                reason: eligibility.reason,
            });
        }
    }

    Ok(Json(issues))
}
