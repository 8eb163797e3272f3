//! Read model for the appointment/location domain.
//!
//! The scheduling domain owns these tables; this store only reads the
//! pickup window and the location's published schedule versions for the
//! eligibility filter and the issues report.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::types::{Appointment, ScheduleVersion};

/// An appointment together with its location's schedule versions, ready for
/// the opening-hours check.
#[derive(Debug, Clone)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub schedules: Vec<ScheduleVersion>,
}

pub struct ScheduleStore;

impl ScheduleStore {
    /// Load an appointment and its location's schedules. Returns `None`
    /// when the appointment does not exist or was soft-deleted.
    pub async fn appointment_details(
        pool: &PgPool,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentDetails>, AppError> {
        let appointment: Option<Appointment> =
            sqlx::query_as("SELECT * FROM appointments WHERE id = $1 AND deleted_at IS NULL")
                .bind(appointment_id)
                .fetch_optional(pool)
                .await?;

        let Some(appointment) = appointment else {
            return Ok(None);
        };

        let schedules = Self::schedules_for_location(pool, appointment.location_id).await?;

        Ok(Some(AppointmentDetails {
            appointment,
            schedules,
        }))
    }

    /// All schedule versions published for a location.
    pub async fn schedules_for_location(
        pool: &PgPool,
        location_id: Uuid,
    ) -> Result<Vec<ScheduleVersion>, AppError> {
        let schedules: Vec<ScheduleVersion> = sqlx::query_as(
            "SELECT * FROM location_schedules WHERE location_id = $1 ORDER BY valid_from ASC",
        )
        .bind(location_id)
        .fetch_all(pool)
        .await?;

        Ok(schedules)
    }

    /// Upcoming (non-deleted) appointments, soonest first. Used by the
    /// issues report to flag pickups scheduled outside opening hours.
    pub async fn upcoming_appointments(
        pool: &PgPool,
        from: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppError> {
        let appointments: Vec<Appointment> = sqlx::query_as(
            r#"
            SELECT * FROM appointments
            WHERE deleted_at IS NULL AND earliest_pickup >= $1
            ORDER BY earliest_pickup ASC
            "#,
        )
        .bind(from)
        .fetch_all(pool)
        .await?;

        Ok(appointments)
    }
}
