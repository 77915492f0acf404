//! HTTP API layer for eventix.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: capacities, reservations and a liveness check
//! - **State**: services shared by every handler via [`middleware::AppState`]
//! - **Responses**: the `{"data": ...}` envelope in [`response::ApiResponse`]
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod middleware;
pub mod response;

pub use endpoints::router;
