//! Delivery-confirmation pass.
//!
//! The gateway reports final delivery status asynchronously. This pass
//! re-queries it for `sent` messages past a settling threshold and records
//! the result. Messages unconfirmed after the staleness cutoff are surfaced
//! to operators as their own failure class — never re-attempted, because
//! re-sending a possibly-delivered message risks a duplicate text.

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;

use pantry_common::types::ProviderStatus;
use pantry_store::messages::MessageStore;

use crate::sms::SmsClient;

/// Counters for one confirmation pass.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ConfirmSummary {
    pub polled: usize,
    pub confirmed: u32,
    pub stale: usize,
}

/// Periodic poller recording delivery confirmations.
pub struct ConfirmationPoller {
    pool: PgPool,
    sms: SmsClient,
    confirm_after: chrono::Duration,
    stale_after: chrono::Duration,
    interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(
        pool: PgPool,
        sms: SmsClient,
        confirm_after_minutes: i64,
        stale_unconfirmed_hours: i64,
        interval_secs: u64,
    ) -> Self {
        Self {
            pool,
            sms,
            confirm_after: chrono::Duration::minutes(confirm_after_minutes),
            stale_after: chrono::Duration::hours(stale_unconfirmed_hours),
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Start the confirmation loop. Runs indefinitely until cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Confirmation poller started"
        );

        loop {
            match self.pass().await {
                Ok(summary) => {
                    if summary.polled > 0 {
                        tracing::debug!(
                            polled = summary.polled,
                            confirmed = summary.confirmed,
                            stale = summary.stale,
                            "Confirmation pass finished"
                        );
                    }
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Confirmation pass failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Run one confirmation pass.
    pub async fn pass(&self) -> anyhow::Result<ConfirmSummary> {
        let now = Utc::now();
        let unconfirmed =
            MessageStore::unconfirmed_sent(&self.pool, now - self.confirm_after).await?;

        let mut summary = ConfirmSummary {
            polled: unconfirmed.len(),
            ..ConfirmSummary::default()
        };

        for message in &unconfirmed {
            let Some(provider_message_id) = message.provider_message_id.as_deref() else {
                continue;
            };

            match self.sms.fetch_status(provider_message_id).await {
                Ok(Some(status)) => {
                    MessageStore::record_provider_status(&self.pool, message.id, status).await?;
                    summary.confirmed += 1;
                    if status != ProviderStatus::Delivered {
                        tracing::warn!(
                            message_id = %message.id,
                            status = %status,
                            "Provider reports message not delivered"
                        );
                    }
                }
                Ok(None) => {
                    // Still in flight at the gateway; ask again next pass.
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        error = %e,
                        "Delivery report query failed"
                    );
                }
            }
        }

        let stale = MessageStore::stale_unconfirmed(&self.pool, now - self.stale_after).await?;
        summary.stale = stale.len();
        if !stale.is_empty() {
            tracing::warn!(
                count = stale.len(),
                "Stale unconfirmed messages need operator attention"
            );
        }

        Ok(summary)
    }
}
