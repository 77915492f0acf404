//! API middleware.

#![allow(missing_docs)]

use axum::{extract::Request, middleware::Next, response::Response};
use eventix_core::{CapacityService, GroupRegistrationService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub capacity_service: CapacityService,
    pub group_registration_service: GroupRegistrationService,
}

/// Adds `Cache-Control: no-store` to every response.
///
/// Availability and reservation payloads go stale within seconds.
pub async fn no_store(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        axum::http::HeaderValue::from_static("no-store"),
    );
    response
}
