//! Cancellation & rescheduling handler.
//!
//! Invoked synchronously inside the transaction that soft-deletes or
//! time-shifts an appointment, so "appointment changed" and "reminders
//! cancelled" commit atomically. The handler takes the caller's connection
//! and never opens a transaction of its own.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::types::{MessageIntent, MessageStatus, OutgoingMessage, PickupWindow};

use crate::messages::{CreateMessageParams, MessageStore};

/// What happened to the appointment.
#[derive(Debug, Clone)]
pub enum AppointmentChange {
    Deleted,
    Rescheduled { new_window: PickupWindow },
}

/// Lifecycle event emitted by the appointment-scheduling domain.
#[derive(Debug, Clone)]
pub struct AppointmentEvent {
    pub appointment_id: Uuid,
    pub household_id: Uuid,
    pub change: AppointmentChange,
}

/// Result of handling an appointment event.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    /// Pending reminder-class messages transitioned to `cancelled`.
    pub cancelled_reminders: u64,
    /// The synthesized notice, when a reminder had already been delivered.
    pub notice_id: Option<Uuid>,
}

/// Handle an appointment delete or reschedule.
///
/// Pending reminder-class messages are silently cancelled — the recipient
/// never saw them. If a reminder was already delivered, exactly one notice
/// is synthesized per appointment (per new window for reschedules): the
/// deterministic idempotency key makes repeated invocations no-ops.
/// `notice_body` is the pre-rendered text for that notice; rendering is an
/// external collaborator.
pub async fn handle_appointment_change(
    conn: &mut PgConnection,
    event: &AppointmentEvent,
    notice_body: &str,
) -> Result<CancellationOutcome, AppError> {
    let messages: Vec<OutgoingMessage> = sqlx::query_as(
        r#"
        SELECT * FROM outgoing_messages
        WHERE appointment_id = $1 AND intent IN ('pickup_reminder', 'pickup_updated')
        ORDER BY created_at DESC
        "#,
    )
    .bind(event.appointment_id)
    .fetch_all(&mut *conn)
    .await?;

    let cancelled_reminders = sqlx::query(
        r#"
        UPDATE outgoing_messages
        SET status = 'cancelled', next_attempt_at = NULL
        WHERE appointment_id = $1 AND status IN ('queued', 'sending', 'retrying')
          AND intent IN ('pickup_reminder', 'pickup_updated')
        "#,
    )
    .bind(event.appointment_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if cancelled_reminders > 0 {
        tracing::info!(
            appointment_id = %event.appointment_id,
            cancelled = cancelled_reminders,
            "Cancelled pending reminders"
        );
    }

    // The newest delivered reminder decides whether the recipient must be
    // told the appointment changed.
    let delivered = messages.iter().find(|m| m.status == MessageStatus::Sent);

    let mut notice_id = None;
    if let Some(sent) = delivered {
        if let (Some(destination), Some(household_id)) = (&sent.destination, sent.household_id) {
            let (intent, appointment_ref, idempotency_key) = match &event.change {
                AppointmentChange::Deleted => (
                    MessageIntent::PickupCancelled,
                    // The appointment is gone; the notice outlives it.
                    None,
                    format!("pickup-cancelled:{}", event.appointment_id),
                ),
                AppointmentChange::Rescheduled { new_window } => (
                    MessageIntent::PickupUpdated,
                    Some(event.appointment_id),
                    format!(
                        "pickup-updated:{}:{}",
                        event.appointment_id,
                        new_window.earliest.timestamp()
                    ),
                ),
            };

            let params = CreateMessageParams {
                intent,
                appointment_id: appointment_ref,
                household_id,
                destination: destination.clone(),
                body: notice_body.to_string(),
                send_at: Utc::now(),
                idempotency_key,
            };
            let notice = MessageStore::create(&mut *conn, &params).await?;

            tracing::info!(
                appointment_id = %event.appointment_id,
                notice_id = %notice.id,
                intent = %intent,
                "Notice queued for delivered reminder"
            );
            notice_id = Some(notice.id);
        } else {
            tracing::debug!(
                appointment_id = %event.appointment_id,
                "Delivered reminder was anonymized, skipping notice"
            );
        }
    }

    Ok(CancellationOutcome {
        cancelled_reminders,
        notice_id,
    })
}
