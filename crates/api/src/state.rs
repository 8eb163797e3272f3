//! Shared application state for the Axum admin server.

use pantry_common::config::AppConfig;
use pantry_dispatcher::sms::SmsClient;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sms: SmsClient,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, sms: SmsClient, config: AppConfig) -> Self {
        Self { pool, sms, config }
    }
}
