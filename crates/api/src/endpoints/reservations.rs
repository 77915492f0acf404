//! Reservation endpoints.
//!
//! A reservation is a group registration together with its capacity hold,
//! addressed by group code.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use eventix_common::{AppError, AppResult};
use eventix_core::CreateGroupRegistrationInput;
use eventix_db::entities::group_registration::{self, RegistrationStatus};
use serde::{Deserialize, Serialize};

use crate::{
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Maximum page size for listings.
const MAX_LIMIT: u64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation).get(list_reservations))
        .route("/{group_code}", get(get_reservation))
        .route("/{group_code}/submit", post(submit_reservation))
        .route("/{group_code}/confirm", post(confirm_reservation))
        .route("/{group_code}/cancel", post(cancel_reservation))
        .route("/{group_code}/refund", post(refund_reservation))
        .route("/{group_code}/archive", post(archive_reservation))
}

// ==================== Request/Response Types ====================

/// Reservation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub group_code: String,
    pub event_id: String,
    pub organizer_id: String,
    pub hold_id: String,
    pub participant_count: i32,
    pub base_price: i64,
    pub group_discount_percent: i32,
    pub discount_amount: i64,
    pub final_price: i64,
    pub status: RegistrationStatus,
    pub expires_at: String,
    pub payment_reference: Option<String>,
    pub paid_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_at: String,
}

impl From<group_registration::Model> for ReservationResponse {
    fn from(r: group_registration::Model) -> Self {
        Self {
            group_code: r.group_code,
            event_id: r.event_id,
            organizer_id: r.organizer_id,
            hold_id: r.hold_id,
            participant_count: r.participant_count,
            base_price: r.base_price,
            group_discount_percent: r.group_discount_percent,
            discount_amount: r.discount_amount,
            final_price: r.final_price,
            status: r.status,
            expires_at: r.reservation_expires_at.to_rfc3339(),
            payment_reference: r.payment_reference,
            paid_at: r.paid_at.map(|t| t.to_rfc3339()),
            confirmed_at: r.confirmed_at.map(|t| t.to_rfc3339()),
            cancelled_at: r.cancelled_at.map(|t| t.to_rfc3339()),
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// List reservations query. Exactly one of `eventId` or `organizerId`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReservationsQuery {
    pub event_id: Option<String>,
    pub organizer_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    10
}

/// Payment captured callback body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmReservationRequest {
    /// Gateway capture or contract id.
    #[serde(default)]
    pub payment_reference: Option<String>,
}

// ==================== Handlers ====================

/// Start a group checkout: hold capacity and open the registration.
async fn create_reservation(
    State(state): State<AppState>,
    Json(input): Json<CreateGroupRegistrationInput>,
) -> AppResult<(StatusCode, ApiResponse<ReservationResponse>)> {
    let registration = state.group_registration_service.create(input).await?;
    Ok(ApiResponse::created(registration.into()))
}

async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListReservationsQuery>,
) -> AppResult<ApiResponse<Vec<ReservationResponse>>> {
    let limit = query.limit.min(MAX_LIMIT);
    let service = &state.group_registration_service;

    let registrations = match (query.event_id, query.organizer_id) {
        (Some(event_id), None) => service.list_by_event(&event_id, limit, query.offset).await?,
        (None, Some(organizer_id)) => {
            service
                .list_by_organizer(&organizer_id, limit, query.offset)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "Exactly one of eventId or organizerId is required".to_string(),
            ));
        }
    };

    Ok(ApiResponse::ok(
        registrations.into_iter().map(Into::into).collect(),
    ))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> AppResult<ApiResponse<ReservationResponse>> {
    let registration = state.group_registration_service.get(&group_code).await?;
    Ok(ApiResponse::ok(registration.into()))
}

/// Organizer submitted a payment intent.
async fn submit_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> AppResult<ApiResponse<ReservationResponse>> {
    let registration = state
        .group_registration_service
        .submit_payment_intent(&group_code)
        .await?;
    Ok(ApiResponse::ok(registration.into()))
}

/// Payment webhook: the gateway captured the payment.
///
/// The body is optional; a request without `Content-Type` confirms without
/// a payment reference.
async fn confirm_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
    body: Option<Json<ConfirmReservationRequest>>,
) -> AppResult<ApiResponse<ReservationResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    tracing::debug!(
        group_code = %group_code,
        payment_reference = ?req.payment_reference,
        "Payment confirmation received"
    );
    let registration = state
        .group_registration_service
        .confirm_payment(&group_code, req.payment_reference.as_deref())
        .await?;
    Ok(ApiResponse::ok(registration.into()))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> AppResult<ApiResponse<ReservationResponse>> {
    let registration = state.group_registration_service.cancel(&group_code).await?;
    Ok(ApiResponse::ok(registration.into()))
}

async fn refund_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> AppResult<ApiResponse<ReservationResponse>> {
    let registration = state.group_registration_service.refund(&group_code).await?;
    Ok(ApiResponse::ok(registration.into()))
}

async fn archive_reservation(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> AppResult<StatusCode> {
    state.group_registration_service.archive(&group_code).await?;
    Ok(no_content())
}
