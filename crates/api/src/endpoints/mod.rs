//! API endpoints.

mod capacities;
mod health;
mod reservations;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/capacities", capacities::router())
        .nest("/reservations", reservations::router())
}
