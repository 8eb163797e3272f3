//! Operator-facing message operations backing the admin surface.
//!
//! A retry never re-attempts the failed row itself: it creates a fresh
//! record with a deterministic idempotency key and hides the old one via
//! `dismissed_at`, keeping the original's attempt history intact.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::types::{Appointment, MessageStatus, OutgoingMessage};

use crate::messages::{CreateMessageParams, MessageStore};

/// One page of the failure listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailurePage {
    pub items: Vec<OutgoingMessage>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

pub struct AdminStore;

impl AdminStore {
    /// Failed messages not yet dismissed, newest first, paginated.
    pub async fn list_failures(
        pool: &PgPool,
        page: i64,
        per_page: i64,
    ) -> Result<FailurePage, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM outgoing_messages WHERE status = 'failed' AND dismissed_at IS NULL",
        )
        .fetch_one(pool)
        .await?;

        let items: Vec<OutgoingMessage> = sqlx::query_as(
            r#"
            SELECT * FROM outgoing_messages
            WHERE status = 'failed' AND dismissed_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;

        Ok(FailurePage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Retry a failed message by creating a fresh record and dismissing the
    /// original.
    ///
    /// Guards, in order: the message must exist and be `failed`; a
    /// reminder's appointment must still exist (`PARCEL_NOT_FOUND`) and lie
    /// at least `min_lead` ahead (`TOO_LATE`); a retry issued within
    /// `cooldown` of a previous one returns `COOLDOWN_ACTIVE`, later ones
    /// `INVALID_ACTION` (the replacement row is the one to act on).
    pub async fn retry(
        pool: &PgPool,
        id: Uuid,
        operator: &str,
        now: DateTime<Utc>,
        cooldown: Duration,
        min_lead: Duration,
    ) -> Result<OutgoingMessage, AppError> {
        let original = MessageStore::get(pool, id).await?;

        if original.status != MessageStatus::Failed {
            return Err(AppError::InvalidAction(format!(
                "Message {} is {}, only failed messages can be retried",
                id, original.status
            )));
        }

        if let Some(appointment_id) = original.appointment_id {
            let appointment: Option<Appointment> =
                sqlx::query_as("SELECT * FROM appointments WHERE id = $1 AND deleted_at IS NULL")
                    .bind(appointment_id)
                    .fetch_optional(pool)
                    .await?;

            let Some(appointment) = appointment else {
                return Err(AppError::ParcelNotFound(format!(
                    "Appointment {} no longer exists",
                    appointment_id
                )));
            };

            if appointment.earliest_pickup - now < min_lead {
                return Err(AppError::TooLate(format!(
                    "Pickup window starts at {}, too close to resend",
                    appointment.earliest_pickup
                )));
            }
        }

        let replacement_key = format!("retry:{}", original.id);
        let existing: Option<OutgoingMessage> =
            sqlx::query_as("SELECT * FROM outgoing_messages WHERE idempotency_key = $1")
                .bind(&replacement_key)
                .fetch_optional(pool)
                .await?;

        if let Some(replacement) = existing {
            if now - replacement.created_at < cooldown {
                return Err(AppError::CooldownActive(format!(
                    "Message {} was retried at {}",
                    id, replacement.created_at
                )));
            }
            return Err(AppError::InvalidAction(format!(
                "Message {} was already retried as {}",
                id, replacement.id
            )));
        }

        let (Some(destination), Some(body), Some(household_id)) = (
            original.destination.clone(),
            original.body.clone(),
            original.household_id,
        ) else {
            return Err(AppError::InvalidAction(format!(
                "Message {} was anonymized and cannot be resent",
                id
            )));
        };

        let mut tx = pool.begin().await?;

        let replacement = MessageStore::create(
            &mut *tx,
            &CreateMessageParams {
                intent: original.intent,
                appointment_id: original.appointment_id,
                household_id,
                destination,
                body,
                send_at: now,
                idempotency_key: replacement_key,
            },
        )
        .await?;

        sqlx::query(
            "UPDATE outgoing_messages SET dismissed_at = $2, dismissed_by = $3 WHERE id = $1",
        )
        .bind(original.id)
        .bind(now)
        .bind(operator)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            message_id = %original.id,
            replacement_id = %replacement.id,
            operator,
            "Failed message retried"
        );

        Ok(replacement)
    }

    /// Hide a terminal message from the failure listing.
    pub async fn dismiss(
        pool: &PgPool,
        id: Uuid,
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<OutgoingMessage, AppError> {
        let message = MessageStore::get(pool, id).await?;

        if !matches!(message.status, MessageStatus::Sent | MessageStatus::Failed) {
            return Err(AppError::InvalidAction(format!(
                "Message {} is {}, only sent or failed messages can be dismissed",
                id, message.status
            )));
        }

        let dismissed: OutgoingMessage = sqlx::query_as(
            r#"
            UPDATE outgoing_messages
            SET dismissed_at = $2, dismissed_by = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(operator)
        .fetch_one(pool)
        .await?;

        tracing::info!(message_id = %id, operator, "Message dismissed");
        Ok(dismissed)
    }

    /// Undo a dismissal, restoring the message to the failure listing.
    pub async fn restore(pool: &PgPool, id: Uuid) -> Result<OutgoingMessage, AppError> {
        let message = MessageStore::get(pool, id).await?;

        if message.dismissed_at.is_none() {
            return Err(AppError::InvalidAction(format!(
                "Message {} is not dismissed",
                id
            )));
        }

        let restored: OutgoingMessage = sqlx::query_as(
            r#"
            UPDATE outgoing_messages
            SET dismissed_at = NULL, dismissed_by = NULL
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        tracing::info!(message_id = %id, "Message restored");
        Ok(restored)
    }

    /// Re-queue every non-dismissed balance-exhausted failure after the
    /// provider account was topped up. Fresh records are created with
    /// deterministic keys (`requeue:<old_id>`), so a double submission is a
    /// no-op; the old rows are dismissed. Anonymized rows are skipped.
    pub async fn requeue_balance_failures(
        pool: &PgPool,
        operator: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, AppError> {
        let mut tx = pool.begin().await?;

        let failures: Vec<OutgoingMessage> = sqlx::query_as(
            r#"
            SELECT * FROM outgoing_messages
            WHERE status = 'failed' AND balance_failure AND dismissed_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut requeued = 0u32;
        for original in failures {
            let (Some(destination), Some(body), Some(household_id)) = (
                original.destination.clone(),
                original.body.clone(),
                original.household_id,
            ) else {
                continue;
            };

            MessageStore::create(
                &mut *tx,
                &CreateMessageParams {
                    intent: original.intent,
                    appointment_id: original.appointment_id,
                    household_id,
                    destination,
                    body,
                    send_at: now,
                    idempotency_key: format!("requeue:{}", original.id),
                },
            )
            .await?;

            sqlx::query(
                "UPDATE outgoing_messages SET dismissed_at = $2, dismissed_by = $3 WHERE id = $1",
            )
            .bind(original.id)
            .bind(now)
            .bind(operator)
            .execute(&mut *tx)
            .await?;

            requeued += 1;
        }

        tx.commit().await?;

        tracing::info!(requeued, operator, "Balance-exhausted failures re-queued");
        Ok(requeued)
    }
}
