use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use calma_booking::models::{Booking, ClientContact};
use calma_core::payment::ConfirmationToken;
use calma_shared::models::events::{SlotActivityEvent, ACTIVITY_BOOKED, ACTIVITY_CANCELLED};
use calma_shared::pii::Masked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::holds::publish_activity;
use crate::{error::AppError, middleware::auth::ClientClaims, state::AppState};

#[derive(Debug, Deserialize)]
struct ContactRequest {
    name: String,
    phone: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitBookingRequest {
    hold_id: Uuid,
    confirmation: ConfirmationToken,
    contact: Option<ContactRequest>,
}

#[derive(Debug, Serialize)]
struct BookingItemResponse {
    id: Uuid,
    service_id: Uuid,
    quantity: i32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    staff_id: Uuid,
    resource_ids: Vec<Uuid>,
    price_cents: i32,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: Uuid,
    status: String,
    client_name: Option<String>,
    client_phone: Option<Masked<String>>,
    items: Vec<BookingItemResponse>,
    total_cents: i32,
    guarantee_cents: i32,
    currency: String,
    free_cancellation_hours: i64,
}

#[derive(Debug, Serialize)]
struct CancellationResponse {
    booking_id: Uuid,
    status: String,
    guarantee_refunded: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_bookings))
        .route("/v1/bookings/commit", post(commit_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

fn booking_response(booking: &Booking) -> BookingResponse {
    BookingResponse {
        booking_id: booking.id,
        status: booking.status.to_string(),
        client_name: booking.contact.as_ref().map(|c| c.name.clone()),
        client_phone: booking.contact.as_ref().map(|c| c.phone.clone()),
        items: booking
            .items
            .iter()
            .map(|item| BookingItemResponse {
                id: item.id,
                service_id: item.service_id,
                quantity: item.quantity,
                start_time: item.start_time,
                end_time: item.end_time,
                staff_id: item.staff_id,
                resource_ids: item.resource_ids.clone(),
                price_cents: item.price_cents,
            })
            .collect(),
        total_cents: booking.total_cents,
        guarantee_cents: booking.guarantee_cents,
        currency: booking.currency.clone(),
        free_cancellation_hours: booking.policy.free_cancellation_hours,
    }
}

/// Turn a pending hold into a durable booking, given the collaborator's
/// guarantee confirmation. Racing the expiry sweep is safe: whichever takes
/// the hold's state transition first wins.
async fn commit_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Json(req): Json<CommitBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let hold = state
        .holds
        .get(req.hold_id)
        .ok_or(calma_core::EngineError::HoldNotFound(req.hold_id))?;
    if hold.client_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "hold does not belong to you".to_string(),
        ));
    }

    let contact = req.contact.map(|c| ClientContact {
        name: c.name,
        phone: Masked(c.phone),
        email: c.email.map(Masked),
    });

    let booking = state
        .bookings
        .commit(req.hold_id, &req.confirmation, contact, Utc::now())
        .await?;

    publish_activity(&state.bus, ACTIVITY_BOOKED, req.hold_id, &hold.items);
    tracing::info!(booking_id = %booking.id, "booking confirmed");

    Ok(Json(booking_response(&booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.bookings.list_for_client(&claims.sub).await?;
    Ok(Json(bookings.iter().map(booking_response).collect()))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get(booking_id).await?;
    if booking.client_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "booking does not belong to you".to_string(),
        ));
    }
    Ok(Json(booking_response(&booking)))
}

/// Cancel under the policy snapshot taken at commit time. The response says
/// whether the guarantee comes back.
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancellationResponse>, AppError> {
    let booking = state.bookings.get(booking_id).await?;
    if booking.client_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "booking does not belong to you".to_string(),
        ));
    }

    let outcome = state.bookings.cancel(booking_id, Utc::now()).await?;
    let at = Utc::now().timestamp();
    for item in &outcome.booking.items {
        state.bus.publish(SlotActivityEvent {
            kind: ACTIVITY_CANCELLED.to_string(),
            service_id: item.service_id,
            hold_id: outcome.booking.hold_id,
            start_time: item.start_time.timestamp(),
            end_time: item.end_time.timestamp(),
            quantity: item.quantity,
            at,
        });
    }
    tracing::info!(booking_id = %booking_id, refunded = outcome.guarantee_refunded, "booking cancelled");

    Ok(Json(CancellationResponse {
        booking_id,
        status: outcome.booking.status.to_string(),
        guarantee_refunded: outcome.guarantee_refunded,
    }))
}
