// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::{DateTime, Utc, NaiveDate};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, CancelAppointmentRequest, AppointmentSearchQuery,
    AppointmentStatus, AppointmentError,
};
use crate::services::booking::BookingService;
use crate::services::timeslot::parse_time_of_day;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub patient_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityCheckQuery {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingAppointmentsQuery {
    pub patient_id: Option<Uuid>,
    pub therapist_id: Option<Uuid>,
    pub hours_ahead: Option<i32>,
}

fn map_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::SlotNotAvailable => AppError::Conflict("Appointment slot not available".to_string()),
        AppointmentError::InvalidTimeRange(msg) => AppError::Validation(msg),
        AppointmentError::InvalidStatusTransition(status) => AppError::BadRequest(
            format!("Appointment cannot be modified in current status: {}", status)),
        AppointmentError::Unauthorized => AppError::Auth("Not authorized to access this appointment".to_string()),
        AppointmentError::ValidationError(msg) => AppError::Validation(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

/// Book an appointment; only the patient themselves or an admin may book
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to book appointment for this patient".to_string()));
    }

    let booking_service = BookingService::new(&state);
    let appointment = booking_service.book_appointment(request, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Pre-submit availability check for the booking UI
#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let start_time = parse_time_of_day(&query.start_time).map_err(map_error)?;
    let end_time = parse_time_of_day(&query.end_time).map_err(map_error)?;

    let booking_service = BookingService::new(&state);
    let available = booking_service.check_availability(
        query.therapist_id,
        query.date,
        start_time,
        end_time,
        auth.token(),
    ).await.map_err(map_error)?;

    Ok(Json(json!({
        "therapist_id": query.therapist_id,
        "date": query.date,
        "available": available
    })))
}

/// Get a single appointment; visible to its patient, its therapist, or an admin
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.get_appointment(appointment_id, auth.token()).await
        .map_err(map_error)?;

    let is_participant = appointment.patient_id.to_string() == user.id
        || appointment.therapist_id.to_string() == user.id;
    if !is_participant && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to access this appointment".to_string()));
    }

    let effective_status = booking_service.effective_status(&appointment);

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "effective_status": effective_status
    })))
}

/// Search appointments with filters (row-level security scopes the results)
#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<AppointmentQueryParams>,
) -> Result<Json<Value>, AppError> {
    let query = AppointmentSearchQuery {
        patient_id: params.patient_id,
        therapist_id: params.therapist_id,
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    let booking_service = BookingService::new(&state);
    let appointments = booking_service.search_appointments(query, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

/// Upcoming pending/confirmed appointments
#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<UpcomingAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointments = booking_service.get_upcoming_appointments(
        query.patient_id,
        query.therapist_id,
        query.hours_ahead,
        auth.token(),
    ).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

/// All appointments for a patient
#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if patient_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this patient's appointments".to_string()));
    }

    let query = AppointmentSearchQuery {
        patient_id: Some(patient_id),
        therapist_id: None,
        status: None,
        from_date: None,
        to_date: None,
        limit: None,
        offset: None,
    };

    let booking_service = BookingService::new(&state);
    let appointments = booking_service.search_appointments(query, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

/// All appointments for a therapist
#[axum::debug_handler]
pub async fn get_therapist_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(therapist_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if therapist_id.to_string() != user.id && !user.is_admin() {
        return Err(AppError::Auth("Not authorized to view this therapist's appointments".to_string()));
    }

    let query = AppointmentSearchQuery {
        patient_id: None,
        therapist_id: Some(therapist_id),
        status: None,
        from_date: None,
        to_date: None,
        limit: None,
        offset: None,
    };

    let booking_service = BookingService::new(&state);
    let appointments = booking_service.search_appointments(query, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    })))
}

// ==============================================================================
// STATUS TRANSITION HANDLERS
// ==============================================================================

/// Therapist accepts a pending appointment
#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.confirm_appointment(appointment_id, &user, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Cancel an appointment (owning patient, owning therapist, or admin)
#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.cancel_appointment(appointment_id, request, &user, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Therapist marks a confirmed appointment as completed
#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let booking_service = BookingService::new(&state);
    let appointment = booking_service.complete_appointment(appointment_id, &user, auth.token()).await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
