use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_quantity() -> i32 {
    1
}

fn default_limit() -> usize {
    200
}

#[derive(Debug, Serialize)]
struct SlotResponse {
    slot_id: Uuid,
    service_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    available_staff: Vec<Uuid>,
    available_capacity: i32,
    bookable: bool,
}

#[derive(Debug, Serialize)]
struct SlotsResponse {
    slots: Vec<SlotResponse>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/services/{id}/slots", get(get_slots))
}

pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/v1/services/{id}/stream", get(stream_service_activity))
}

/// Bounded page over the lazy slot sequence. The grid is stable: grid
/// points without free staff or capacity are returned flagged, not omitted.
async fn get_slots(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    if state.catalog.service(service_id).is_none() {
        return Err(AppError::NotFoundError(format!(
            "service {} not found",
            service_id
        )));
    }

    let slots = state
        .generator
        .slots(service_id, query.from, query.to, Utc::now())?
        .take(query.limit)
        .map(|slot| SlotResponse {
            bookable: slot.is_bookable(query.quantity),
            slot_id: slot.slot_id,
            service_id: slot.service_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            available_staff: slot.available_staff,
            available_capacity: slot.available_capacity,
        })
        .collect();

    Ok(Json(SlotsResponse { slots }))
}

/// Live capacity movements for one service, so the booking wizard can
/// refresh its grid without polling.
async fn stream_service_activity(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        futures_util::future::ready(match result {
            Ok(event) if event.service_id == service_id => Some(Ok::<_, Infallible>(
                Event::default()
                    .event("slot_activity")
                    .data(serde_json::to_string(&event).unwrap()),
            )),
            _ => None,
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
