//! Dispatch loop.
//!
//! Each tick selects the due messages and processes them sequentially —
//! a deliberate simplicity-over-throughput tradeoff that keeps a reminder
//! ordered against its own cancellation; volume is per-location daily
//! batches, not bulk broadcast. All persistence goes through the store's
//! conditional transitions, so a cancellation landing while an attempt is
//! in flight wins and the provider result is dropped.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use pantry_common::error::AppError;
use pantry_common::types::OutgoingMessage;
use pantry_engine::alerts::{AlertState, ServiceAlerts};
use pantry_engine::eligibility::{self, EligibilityReason};
use pantry_engine::retry::{self, FailureClass, RetryDecision};
use pantry_store::messages::MessageStore;
use pantry_store::schedules::ScheduleStore;

use crate::sms::{SendOutcome, SmsClient};

/// Service name under which gateway failures are alert-deduplicated.
const SMS_SERVICE: &str = "sms-gateway";

/// Minutes between repeated "gateway degraded" alerts.
const ALERT_INTERVAL_MINUTES: i64 = 15;

/// Counters for one dispatch tick.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct TickSummary {
    pub due: usize,
    pub sent: u32,
    pub retried: u32,
    pub failed: u32,
    pub skipped: u32,
}

enum ProcessResult {
    Sent,
    Retried,
    Failed,
    Skipped,
}

/// Periodic process that drives due messages through a delivery attempt.
pub struct Dispatcher {
    pool: PgPool,
    sms: SmsClient,
    batch_size: i64,
    interval: Duration,
    alerts: ServiceAlerts,
}

impl Dispatcher {
    pub fn new(pool: PgPool, sms: SmsClient, batch_size: i64, interval_secs: u64) -> Self {
        Self {
            pool,
            sms,
            batch_size,
            interval: Duration::from_secs(interval_secs),
            alerts: ServiceAlerts::new(
                chrono::Duration::minutes(ALERT_INTERVAL_MINUTES),
                AlertState::new(),
            ),
        }
    }

    /// Start the dispatch loop. Runs indefinitely until the task is cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Dispatcher started"
        );

        loop {
            match self.tick().await {
                Ok(summary) => {
                    if summary.due > 0 {
                        tracing::info!(
                            due = summary.due,
                            sent = summary.sent,
                            retried = summary.retried,
                            failed = summary.failed,
                            skipped = summary.skipped,
                            "Dispatch tick finished"
                        );
                    }
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch tick failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Run one dispatch tick over the currently due messages.
    pub async fn tick(&mut self) -> anyhow::Result<TickSummary> {
        let now = Utc::now();
        let due = MessageStore::due(&self.pool, now, self.batch_size).await?;

        let mut summary = TickSummary {
            due: due.len(),
            ..TickSummary::default()
        };

        for message in &due {
            match self.process_message(message).await {
                Ok(ProcessResult::Sent) => summary.sent += 1,
                Ok(ProcessResult::Retried) => summary.retried += 1,
                Ok(ProcessResult::Failed) => summary.failed += 1,
                Ok(ProcessResult::Skipped) => summary.skipped += 1,
                Err(e) => {
                    // Store write failure: the message keeps its pre-attempt
                    // state and the next tick picks it up again.
                    summary.skipped += 1;
                    tracing::error!(
                        message_id = %message.id,
                        error = %e,
                        "Attempt aborted, message left for next tick"
                    );
                }
            }
        }

        Ok(summary)
    }

    async fn process_message(&mut self, message: &OutgoingMessage) -> Result<ProcessResult, AppError> {
        // Opening-hours gate: an ineligible message stays queued rather than
        // failing, so it is re-evaluated next tick.
        if let Some(appointment_id) = message.appointment_id {
            match ScheduleStore::appointment_details(&self.pool, appointment_id).await {
                Ok(Some(details)) => {
                    let eligibility = eligibility::check_pickup_window(
                        &details.appointment.window(),
                        &details.schedules,
                    );
                    if eligibility.reason == EligibilityReason::InvalidSchedule {
                        tracing::warn!(
                            message_id = %message.id,
                            location_id = %details.appointment.location_id,
                            "Schedule data unparseable, failing open"
                        );
                    }
                    if !eligibility.eligible {
                        tracing::debug!(
                            message_id = %message.id,
                            reason = ?eligibility.reason,
                            "Pickup outside opening hours, message left queued"
                        );
                        return Ok(ProcessResult::Skipped);
                    }
                }
                Ok(None) => {
                    // Appointment gone without the transactional cancel —
                    // shouldn't happen, but a dropped reminder is worse than
                    // a spurious one.
                    tracing::warn!(
                        message_id = %message.id,
                        appointment_id = %appointment_id,
                        "Appointment missing for due message, sending anyway"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        error = %e,
                        "Eligibility lookup failed, failing open"
                    );
                }
            }
        }

        let Some(claimed) = MessageStore::claim_for_sending(&self.pool, message.id).await? else {
            // Cancelled (or claimed elsewhere) between selection and claim.
            return Ok(ProcessResult::Skipped);
        };

        let (Some(destination), Some(body)) = (claimed.destination.clone(), claimed.body.clone())
        else {
            MessageStore::mark_failed(&self.pool, claimed.id, "destination or body missing", false)
                .await?;
            return Ok(ProcessResult::Failed);
        };

        match self.sms.send(&destination, &body).await {
            SendOutcome::Accepted {
                provider_message_id,
            } => {
                self.alerts.clear(SMS_SERVICE);
                let applied = MessageStore::mark_sent(
                    &self.pool,
                    claimed.id,
                    provider_message_id.as_deref(),
                    Utc::now(),
                )
                .await?;
                if applied {
                    tracing::info!(message_id = %claimed.id, "Message sent");
                    Ok(ProcessResult::Sent)
                } else {
                    tracing::debug!(
                        message_id = %claimed.id,
                        "Cancelled mid-flight, provider result discarded"
                    );
                    Ok(ProcessResult::Skipped)
                }
            }
            SendOutcome::Rejected { class, detail } => {
                if class.is_retriable() && self.alerts.should_alert(SMS_SERVICE, Utc::now()) {
                    tracing::warn!(class = %class, detail = %detail, "SMS gateway degraded");
                }
                self.apply_failure(&claimed, class, &detail).await
            }
        }
    }

    async fn apply_failure(
        &self,
        claimed: &OutgoingMessage,
        class: FailureClass,
        detail: &str,
    ) -> Result<ProcessResult, AppError> {
        match retry::decide(claimed.attempt_count - 1, class) {
            RetryDecision::Retry { delay } => {
                let applied =
                    MessageStore::mark_retrying(&self.pool, claimed.id, Utc::now() + delay, detail)
                        .await?;
                if applied {
                    tracing::debug!(
                        message_id = %claimed.id,
                        attempt = claimed.attempt_count,
                        delay_minutes = delay.num_minutes(),
                        "Attempt failed, retry scheduled"
                    );
                    Ok(ProcessResult::Retried)
                } else {
                    Ok(ProcessResult::Skipped)
                }
            }
            RetryDecision::GiveUp => {
                let applied = MessageStore::mark_failed(
                    &self.pool,
                    claimed.id,
                    detail,
                    class == FailureClass::BalanceExhausted,
                )
                .await?;
                if applied {
                    tracing::warn!(
                        message_id = %claimed.id,
                        class = %class,
                        attempts = claimed.attempt_count,
                        "Message failed permanently"
                    );
                    Ok(ProcessResult::Failed)
                } else {
                    Ok(ProcessResult::Skipped)
                }
            }
        }
    }
}
