//! Dispatcher binary: the dispatch loop plus the delivery-confirmation
//! poller, sharing one pool and shutting down together on Ctrl+C.

use pantry_common::config::AppConfig;
use pantry_common::db;
use pantry_dispatcher::confirm::ConfirmationPoller;
use pantry_dispatcher::dispatch::Dispatcher;
use pantry_dispatcher::sms::SmsClient;

/// The confirmation pass runs less often than dispatch ticks.
const CONFIRM_INTERVAL_MULTIPLIER: u64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pantry_dispatcher=info,pantry_store=info".into()),
        )
        .json()
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::connect(&config).await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Migrations applied");

    let sms = SmsClient::from_config(&config)?;

    let mut dispatcher = Dispatcher::new(
        pool.clone(),
        sms.clone(),
        config.dispatch_batch_size,
        config.dispatch_interval_secs,
    );

    let confirmations = ConfirmationPoller::new(
        pool,
        sms,
        config.confirm_after_minutes,
        config.stale_unconfirmed_hours,
        config.dispatch_interval_secs * CONFIRM_INTERVAL_MULTIPLIER,
    );

    tokio::select! {
        result = dispatcher.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Dispatch loop exited");
                return Err(e);
            }
        }
        result = confirmations.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Confirmation poller exited");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Dispatcher stopped");
    Ok(())
}
