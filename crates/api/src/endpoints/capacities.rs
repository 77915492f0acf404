//! Capacity endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use eventix_common::AppResult;
use eventix_core::{CapacitySnapshot, ConfigureCapacityInput};

use crate::{
    middleware::AppState,
    response::{ApiResponse, no_content},
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{event_id}",
        get(get_capacity)
            .put(configure_capacity)
            .delete(remove_capacity),
    )
}

/// Create or reconfigure the capacity of an event.
async fn configure_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(input): Json<ConfigureCapacityInput>,
) -> AppResult<ApiResponse<CapacitySnapshot>> {
    let snapshot = state.capacity_service.configure(&event_id, input).await?;
    Ok(ApiResponse::ok(snapshot))
}

/// Availability of an event.
async fn get_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<ApiResponse<CapacitySnapshot>> {
    let snapshot = state.capacity_service.get(&event_id).await?;
    Ok(ApiResponse::ok(snapshot))
}

async fn remove_capacity(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> AppResult<StatusCode> {
    state.capacity_service.remove(&event_id).await?;
    Ok(no_content())
}
