// libs/therapist-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilitySlotRequest, UpdateAvailabilitySlotRequest, TherapistError,
};
use crate::services::availability::AvailabilityService;

fn map_error(error: TherapistError) -> AppError {
    match error {
        TherapistError::SlotNotFound => AppError::NotFound("Availability slot not found".to_string()),
        TherapistError::InvalidTimeRange(msg) => AppError::Validation(msg),
        TherapistError::InvalidDayOfWeek(day) => AppError::Validation(
            format!("Day of week must be between 0 (Sunday) and 6 (Saturday), got {}", day)),
        TherapistError::OverlappingSlot => AppError::Conflict(
            "Availability slot overlaps an existing slot for this day".to_string()),
        TherapistError::Unauthorized => AppError::Auth("Not authorized to manage this availability slot".to_string()),
        TherapistError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn ensure_owns_schedule(user: &User, therapist_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() || user.id == therapist_id.to_string() {
        Ok(())
    } else {
        Err(AppError::Auth("Not authorized to manage this therapist's schedule".to_string()))
    }
}

/// Create a recurring weekly availability slot
#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
    Json(request): Json<CreateAvailabilitySlotRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_owns_schedule(&user, therapist_id)?;

    let service = AvailabilityService::new(&state);
    let slot = service.create_slot(therapist_id, request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

/// List a therapist's weekly schedule
#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(therapist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service.list_slots(therapist_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist_id": therapist_id,
        "slots": slots
    })))
}

/// Create the registration default schedule (Mon-Fri 09:00-17:00)
#[axum::debug_handler]
pub async fn create_default_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_owns_schedule(&user, therapist_id)?;

    let service = AvailabilityService::new(&state);
    let slots = service.create_default_schedule(therapist_id, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "therapist_id": therapist_id,
        "slots": slots
    })))
}

/// Partially update an availability slot
#[axum::debug_handler]
pub async fn update_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilitySlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let slot = service.update_slot(slot_id, request, &user.id, user.is_admin(), auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

/// Delete an availability slot
#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    service.delete_slot(slot_id, &user.id, user.is_admin(), auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability slot deleted"
    })))
}
