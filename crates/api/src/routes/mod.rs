pub mod dispatch;
pub mod health;
pub mod issues;
pub mod messages;

use axum::Router;

use crate::state::AppState;

/// Build the complete admin router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(messages::router())
        .merge(dispatch::router())
        .merge(issues::router())
        .with_state(state)
}
