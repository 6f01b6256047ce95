use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use calma_catalog::{
    AvailabilityWindow, DayOfWeek, Resource, ResourceRequirement, ResourceType, Service, Staff,
};
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
struct WindowRequest {
    day: DayOfWeek,
    start: NaiveTime,
    end: NaiveTime,
    #[serde(default = "default_available")]
    is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CreateStaffRequest {
    display_name: String,
    #[serde(default)]
    specializations: Vec<String>,
    #[serde(default)]
    windows: Vec<WindowRequest>,
    #[serde(default)]
    service_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreateResourceRequest {
    name: String,
    resource_type: ResourceType,
    capacity: i32,
}

#[derive(Debug, Deserialize)]
struct CreateServiceRequest {
    name: String,
    description: Option<String>,
    duration_minutes: i32,
    #[serde(default)]
    buffer_minutes: i32,
    price_cents: i32,
    #[serde(default)]
    requirements: Vec<ResourceRequirement>,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/staff", post(create_staff))
        .route("/v1/admin/staff/{id}/deactivate", post(deactivate_staff))
        .route("/v1/admin/resources", post(create_resource))
        .route("/v1/admin/resources/{id}/deactivate", post(deactivate_resource))
        .route("/v1/admin/services", post(create_service))
        .route("/v1/admin/services/{id}/deactivate", post(deactivate_service))
        .route("/v1/admin/bookings/{id}/complete", post(complete_booking))
        .route("/v1/admin/bookings/{id}/no_show", post(mark_no_show))
}

async fn create_staff(
    State(state): State<AppState>,
    Json(req): Json<CreateStaffRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let mut staff = Staff::new(req.display_name, req.specializations);
    staff.service_ids = req.service_ids;
    staff.windows = req
        .windows
        .into_iter()
        .map(|w| AvailabilityWindow {
            day: w.day,
            start: w.start,
            end: w.end,
            is_available: w.is_available,
        })
        .collect();
    let id = staff.id;
    state.catalog.upsert_staff(staff)?;
    tracing::info!(staff_id = %id, "staff created");
    Ok(Json(CreatedResponse { id }))
}

async fn deactivate_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.catalog.deactivate_staff(id) {
        return Err(AppError::NotFoundError(format!("staff {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn create_resource(
    State(state): State<AppState>,
    Json(req): Json<CreateResourceRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let resource = Resource::new(req.name, req.resource_type, req.capacity);
    let id = resource.id;
    state.catalog.upsert_resource(resource)?;
    Ok(Json(CreatedResponse { id }))
}

async fn deactivate_resource(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.catalog.deactivate_resource(id) {
        return Err(AppError::NotFoundError(format!("resource {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn create_service(
    State(state): State<AppState>,
    Json(req): Json<CreateServiceRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let mut service = Service::new(
        req.name,
        req.duration_minutes,
        req.buffer_minutes,
        req.price_cents,
        req.requirements,
    );
    service.description = req.description;
    let id = service.id;
    state.catalog.upsert_service(service)?;
    Ok(Json(CreatedResponse { id }))
}

async fn deactivate_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.catalog.deactivate_service(id) {
        return Err(AppError::NotFoundError(format!("service {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = state.bookings.complete(id, Utc::now()).await?;
    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.to_string(),
    })))
}

async fn mark_no_show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = state.bookings.mark_no_show(id, Utc::now()).await?;
    Ok(Json(serde_json::json!({
        "booking_id": booking.id,
        "status": booking.status.to_string(),
    })))
}
