//! Admin API server binary.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pantry_common::config::AppConfig;
use pantry_common::db;
use pantry_dispatcher::sms::SmsClient;

use pantry_api::routes::create_router;
use pantry_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pantry_api=debug,pantry_store=debug,tower_http=debug")
        }))
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));

    let pool = db::connect(&config).await?;
    let sms = SmsClient::from_config(&config)?;
    let state = AppState::new(pool, sms, config);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(%addr, "Admin API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
