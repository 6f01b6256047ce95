use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Extension, Json, Router,
};
use calma_booking::models::{CompositionItem, ServiceSelection, SlotChoice};
use calma_core::payment::ConfirmationToken;
use calma_shared::models::events::{SlotActivityEvent, ACTIVITY_HELD, ACTIVITY_RELEASED};
use calma_store::EventBus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::ClientClaims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub service_id: Uuid,
    pub quantity: i32,
    pub sequence_index: usize,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CompositionRequest {
    pub selections: Vec<SelectionRequest>,
}

#[derive(Debug, Serialize)]
struct CompositionItemResponse {
    service_id: Uuid,
    quantity: i32,
    sequence_index: usize,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    staff_id: Uuid,
    resource_ids: Vec<Uuid>,
    price_cents: i32,
}

#[derive(Debug, Serialize)]
struct CompositionResponse {
    items: Vec<CompositionItemResponse>,
    total_cents: i32,
}

#[derive(Debug, Serialize)]
struct HoldResponse {
    hold_id: Uuid,
    status: String,
    expires_at: DateTime<Utc>,
    total_cents: i32,
    items: Vec<CompositionItemResponse>,
}

#[derive(Debug, Serialize)]
struct GuaranteeResponse {
    confirmation: ConfirmationToken,
    amount_cents: i32,
    currency: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/compositions/validate", post(validate_composition))
        .route("/v1/holds", post(create_hold))
        .route("/v1/holds/{id}", delete(release_hold))
        .route("/v1/holds/{id}/guarantee", post(authorize_guarantee))
}

fn choices(req: &CompositionRequest) -> Vec<SlotChoice> {
    req.selections
        .iter()
        .map(|s| SlotChoice {
            selection: ServiceSelection {
                service_id: s.service_id,
                quantity: s.quantity,
                sequence_index: s.sequence_index,
            },
            start_time: s.start_time,
        })
        .collect()
}

fn item_response(item: &CompositionItem) -> CompositionItemResponse {
    CompositionItemResponse {
        service_id: item.selection.service_id,
        quantity: item.selection.quantity,
        sequence_index: item.selection.sequence_index,
        start_time: item.start_time,
        end_time: item.end_time,
        staff_id: item.staff_id,
        resource_ids: item.resource_ids.clone(),
        price_cents: item.price_cents,
    }
}

pub(crate) fn publish_activity(bus: &EventBus, kind: &str, hold_id: Uuid, items: &[CompositionItem]) {
    let at = Utc::now().timestamp();
    for item in items {
        bus.publish(SlotActivityEvent {
            kind: kind.to_string(),
            service_id: item.selection.service_id,
            hold_id,
            start_time: item.start_time.timestamp(),
            end_time: item.end_time.timestamp(),
            quantity: item.selection.quantity,
            at,
        });
    }
}

/// Authoritative re-validation of a basket. Client-displayed slots are only
/// a hint; this is where stale ones are caught.
async fn validate_composition(
    State(state): State<AppState>,
    Extension(_claims): Extension<ClientClaims>,
    Json(req): Json<CompositionRequest>,
) -> Result<Json<CompositionResponse>, AppError> {
    let composition = state.composer.compose(&choices(&req), Utc::now())?;
    Ok(Json(CompositionResponse {
        items: composition.items.iter().map(item_response).collect(),
        total_cents: composition.total_cents,
    }))
}

/// Re-validate and reserve in one step: whichever request lands first on a
/// capacity bucket wins; the loser gets a typed conflict to re-query with.
async fn create_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Json(req): Json<CompositionRequest>,
) -> Result<Json<HoldResponse>, AppError> {
    let now = Utc::now();
    let composition = state.composer.compose(&choices(&req), now)?;
    let hold = state.holds.create_hold(composition, claims.sub, now)?;

    publish_activity(&state.bus, ACTIVITY_HELD, hold.id, &hold.items);
    tracing::info!(hold_id = %hold.id, expires_at = %hold.expires_at, "hold created");

    Ok(Json(HoldResponse {
        hold_id: hold.id,
        status: hold.status.to_string(),
        expires_at: hold.expires_at,
        total_cents: hold.total_cents,
        items: hold.items.iter().map(item_response).collect(),
    }))
}

/// Explicit abandonment. Idempotent: releasing a hold that already reached
/// a terminal state is a no-op 204, not an error.
async fn release_hold(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Path(hold_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let hold = state
        .holds
        .get(hold_id)
        .ok_or(calma_core::EngineError::HoldNotFound(hold_id))?;
    if hold.client_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "hold does not belong to you".to_string(),
        ));
    }

    if let Some(released) = state.holds.release_hold(hold_id, Utc::now())? {
        publish_activity(&state.bus, ACTIVITY_RELEASED, released.id, &released.items);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The step between hold and commit: ask the payment collaborator to
/// authorize the guarantee amount for this hold.
async fn authorize_guarantee(
    State(state): State<AppState>,
    Extension(claims): Extension<ClientClaims>,
    Path(hold_id): Path<Uuid>,
) -> Result<Json<GuaranteeResponse>, AppError> {
    let now = Utc::now();
    let hold = state
        .holds
        .get(hold_id)
        .ok_or(calma_core::EngineError::HoldNotFound(hold_id))?;
    if hold.client_id != claims.sub {
        return Err(AppError::AuthorizationError(
            "hold does not belong to you".to_string(),
        ));
    }
    if hold.is_expired(now) || hold.status == calma_booking::HoldStatus::Expired {
        return Err(calma_core::EngineError::HoldExpired(hold_id).into());
    }

    let amount_cents = state.bookings.guarantee_amount(hold.total_cents);
    let currency = state.bookings.rules().currency.clone();
    let confirmation = state
        .guarantee
        .authorize(hold.id, amount_cents, &currency)
        .await
        .map_err(|e| AppError::GuaranteeError(e.to_string()))?;

    Ok(Json(GuaranteeResponse {
        confirmation,
        amount_cents,
        currency,
    }))
}
