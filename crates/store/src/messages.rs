//! Message record store — the single source of truth for "has this been
//! sent".
//!
//! Every state transition is a conditional UPDATE guarded by the current
//! status, so concurrent writers serialize through the row and an
//! out-of-band cancellation always wins: a transition that returns `false`
//! means the message left the expected state in the meantime and the
//! caller's result must be discarded.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use pantry_common::error::AppError;
use pantry_common::redact::redact_phone_numbers;
use pantry_common::types::{MessageIntent, OutgoingMessage, ProviderStatus};

/// Parameters for creating a new outbound message.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CreateMessageParams {
    pub intent: MessageIntent,
    pub appointment_id: Option<Uuid>,
    pub household_id: Uuid,
    /// Normalized destination phone number.
    pub destination: String,
    /// Final rendered message body (rendering is an external collaborator).
    pub body: String,
    /// When the first delivery attempt becomes due.
    pub send_at: DateTime<Utc>,
    /// Caller-supplied key deduplicating logically identical creates.
    pub idempotency_key: String,
}

/// Store layer for the `outgoing_messages` table.
pub struct MessageStore;

impl MessageStore {
    /// Create a message, idempotent on `idempotency_key`.
    ///
    /// A colliding create is a no-op that returns the existing row. Takes a
    /// generic executor so callers can compose it into their own
    /// transaction (the cancellation handler does).
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        params: &CreateMessageParams,
    ) -> Result<OutgoingMessage, AppError> {
        let id = Uuid::new_v4();
        let message: OutgoingMessage = sqlx::query_as(
            r#"
            INSERT INTO outgoing_messages
                (id, intent, appointment_id, household_id, destination, body,
                 status, attempt_count, next_attempt_at, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'queued', 0, $7, $8, $9)
            ON CONFLICT (idempotency_key)
                DO UPDATE SET idempotency_key = outgoing_messages.idempotency_key
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(params.intent.to_string())
        .bind(params.appointment_id)
        .bind(params.household_id)
        .bind(&params.destination)
        .bind(&params.body)
        .bind(params.send_at)
        .bind(&params.idempotency_key)
        .bind(Utc::now())
        .fetch_one(executor)
        .await?;

        if message.id == id {
            tracing::info!(
                message_id = %message.id,
                intent = %params.intent,
                "Message queued"
            );
        } else {
            tracing::debug!(
                message_id = %message.id,
                idempotency_key = %params.idempotency_key,
                "Duplicate create suppressed, returning existing message"
            );
        }

        Ok(message)
    }

    /// Get a single message by ID.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<OutgoingMessage, AppError> {
        let message: OutgoingMessage =
            sqlx::query_as("SELECT * FROM outgoing_messages WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        Ok(message)
    }

    /// Select messages due for a delivery attempt, oldest due first.
    pub async fn due(
        pool: &PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutgoingMessage>, AppError> {
        let messages: Vec<OutgoingMessage> = sqlx::query_as(
            r#"
            SELECT * FROM outgoing_messages
            WHERE status IN ('queued', 'retrying') AND next_attempt_at <= $1
            ORDER BY next_attempt_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Claim a message for an attempt: `queued`/`retrying` → `sending`,
    /// incrementing `attempt_count`.
    ///
    /// Returns `None` if the message was cancelled (or claimed elsewhere)
    /// since it was selected.
    pub async fn claim_for_sending(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<OutgoingMessage>, AppError> {
        let claimed: Option<OutgoingMessage> = sqlx::query_as(
            r#"
            UPDATE outgoing_messages
            SET status = 'sending', attempt_count = attempt_count + 1
            WHERE id = $1 AND status IN ('queued', 'retrying')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(claimed)
    }

    /// `sending` → `sent`. Returns whether the transition applied; `false`
    /// means the message was cancelled mid-flight and the provider result
    /// must be discarded.
    pub async fn mark_sent(
        pool: &PgPool,
        id: Uuid,
        provider_message_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE outgoing_messages
            SET status = 'sent', sent_at = $2, next_attempt_at = NULL,
                provider_message_id = $3, last_error = NULL
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(provider_message_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// `sending` → `retrying` with the next attempt scheduled. Error text
    /// is redacted before storage.
    pub async fn mark_retrying(
        pool: &PgPool,
        id: Uuid,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE outgoing_messages
            SET status = 'retrying', next_attempt_at = $2, last_error = $3
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(redact_phone_numbers(error))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// `sending` → `failed`. Error text is redacted before storage;
    /// `balance_failure` flags credit-exhausted failures for bulk re-queue.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        balance_failure: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE outgoing_messages
            SET status = 'failed', next_attempt_at = NULL, last_error = $2,
                balance_failure = $3
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(redact_phone_numbers(error))
        .bind(balance_failure)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record an asynchronous delivery confirmation from the provider.
    pub async fn record_provider_status(
        pool: &PgPool,
        id: Uuid,
        status: ProviderStatus,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE outgoing_messages SET provider_status = $2 WHERE id = $1 AND status = 'sent'",
        )
        .bind(id)
        .bind(status.to_string())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Sent messages with no delivery confirmation yet, sent before
    /// `sent_before`. The confirmation pass polls the provider for these.
    pub async fn unconfirmed_sent(
        pool: &PgPool,
        sent_before: DateTime<Utc>,
    ) -> Result<Vec<OutgoingMessage>, AppError> {
        let messages: Vec<OutgoingMessage> = sqlx::query_as(
            r#"
            SELECT * FROM outgoing_messages
            WHERE status = 'sent' AND provider_status IS NULL
              AND provider_message_id IS NOT NULL AND sent_at <= $1
            ORDER BY sent_at ASC
            "#,
        )
        .bind(sent_before)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Sent messages still unconfirmed (or reported undelivered) past the
    /// staleness cutoff. Reported, never re-attempted: a re-send of a
    /// possibly-delivered message risks a duplicate text.
    pub async fn stale_unconfirmed(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<OutgoingMessage>, AppError> {
        let messages: Vec<OutgoingMessage> = sqlx::query_as(
            r#"
            SELECT * FROM outgoing_messages
            WHERE status = 'sent' AND sent_at <= $1
              AND (provider_status IS NULL OR provider_status = 'not_delivered')
            ORDER BY sent_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Blank a household's PII across its message history, preserving the
    /// rows for audit. Pending messages are cancelled first so the
    /// dispatcher never picks up a blanked destination.
    pub async fn anonymize_household(pool: &PgPool, household_id: Uuid) -> Result<u64, AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE outgoing_messages
            SET status = 'cancelled', next_attempt_at = NULL
            WHERE household_id = $1 AND status IN ('queued', 'sending', 'retrying')
            "#,
        )
        .bind(household_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE outgoing_messages
            SET destination = NULL, body = NULL, last_error = NULL, household_id = NULL
            WHERE household_id = $1
            "#,
        )
        .bind(household_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let anonymized = result.rows_affected();
        tracing::info!(household_id = %household_id, anonymized, "Household messages anonymized");
        Ok(anonymized)
    }
}
