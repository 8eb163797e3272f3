use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Base URL of the SMS gateway API
    pub sms_api_url: String,

    /// API key for the SMS gateway
    pub sms_api_key: String,

    /// Sender name shown on recipients' phones
    pub sms_sender: String,

    /// Route sends through the gateway's sandbox (no real texts)
    pub sms_test_mode: bool,

    /// Dispatch tick interval in seconds (default: 60)
    pub dispatch_interval_secs: u64,

    /// Maximum messages processed per dispatch tick (default: 100)
    pub dispatch_batch_size: i64,

    /// Per-call timeout for the SMS gateway in seconds (default: 10)
    pub send_timeout_secs: u64,

    /// Minutes after sending before the delivery confirmation is polled (default: 30)
    pub confirm_after_minutes: i64,

    /// Hours after sending before an unconfirmed message counts as stale (default: 24)
    pub stale_unconfirmed_hours: i64,

    /// Cooldown in minutes between operator retries of the same failure (default: 15)
    pub retry_cooldown_minutes: i64,

    /// Minimum minutes before the pickup window for an operator retry (default: 60)
    pub retry_min_lead_minutes: i64,

    /// Port the admin API listens on (default: 3000)
    pub api_port: u16,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            sms_api_url: std::env::var("SMS_API_URL")
                .unwrap_or_else(|_| "https://api.smsgateway.example/v1".to_string()),
            sms_api_key: std::env::var("SMS_API_KEY")
                .map_err(|_| anyhow::anyhow!("SMS_API_KEY environment variable is required"))?,
            sms_sender: std::env::var("SMS_SENDER").unwrap_or_else(|_| "FoodPickup".to_string()),
            sms_test_mode: std::env::var("SMS_TEST_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            dispatch_interval_secs: std::env::var("DISPATCH_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_INTERVAL_SECS must be a valid u64"))?,
            dispatch_batch_size: std::env::var("DISPATCH_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_BATCH_SIZE must be a valid i64"))?,
            send_timeout_secs: std::env::var("SEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEND_TIMEOUT_SECS must be a valid u64"))?,
            confirm_after_minutes: std::env::var("CONFIRM_AFTER_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CONFIRM_AFTER_MINUTES must be a valid i64"))?,
            stale_unconfirmed_hours: std::env::var("STALE_UNCONFIRMED_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("STALE_UNCONFIRMED_HOURS must be a valid i64"))?,
            retry_cooldown_minutes: std::env::var("RETRY_COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_COOLDOWN_MINUTES must be a valid i64"))?,
            retry_min_lead_minutes: std::env::var("RETRY_MIN_LEAD_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_MIN_LEAD_MINUTES must be a valid i64"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
