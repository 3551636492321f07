// libs/booking-cell/src/services/booking.rs
use chrono::{DateTime, Utc, Duration as ChronoDuration};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use tokio::sync::Mutex as AsyncMutex;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::cache::schedule_cache;

use crate::models::{
    Appointment, AppointmentStatus, AppointmentError, BookAppointmentRequest,
    CancelAppointmentRequest, AppointmentSearchQuery,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::resolver::AvailabilityResolver;

/// One async mutex per therapist, held across the conflict check and the
/// insert so two concurrent bookings cannot both observe "no conflict".
fn therapist_write_lock(therapist_id: Uuid) -> Arc<AsyncMutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>> = OnceLock::new();

    let locks = LOCKS.get_or_init(|| StdMutex::new(HashMap::new()));
    let mut map = locks.lock().unwrap();
    map.entry(therapist_id)
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    resolver: AvailabilityResolver,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let resolver = AvailabilityResolver::new(Arc::clone(&supabase));
        let lifecycle = AppointmentLifecycleService::new();

        Self {
            supabase,
            resolver,
            lifecycle,
        }
    }

    /// Book an appointment for a patient. The requested range must pass the
    /// availability resolver; the check and the insert run under the
    /// therapist's write lock.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with therapist {}",
              request.patient_id, request.therapist_id);

        if request.end_time <= request.start_time {
            return Err(AppointmentError::InvalidTimeRange(
                "end_time must be after start_time".to_string(),
            ));
        }

        if request.title.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "title must not be empty".to_string(),
            ));
        }

        let start_time = request.date.and_time(request.start_time).and_utc();
        let end_time = request.date.and_time(request.end_time).and_utc();

        if start_time <= Utc::now() {
            return Err(AppointmentError::ValidationError(
                "Appointments must be booked in the future".to_string(),
            ));
        }

        let lock = therapist_write_lock(request.therapist_id);
        let _guard = lock.lock().await;

        let available = self.resolver.is_slot_available(
            request.therapist_id,
            request.date,
            request.start_time,
            request.end_time,
            auth_token,
        ).await?;

        if !available {
            warn!("Slot not available for therapist {} on {} from {} to {}",
                  request.therapist_id, request.date, request.start_time, request.end_time);
            return Err(AppointmentError::SlotNotAvailable);
        }

        let appointment = self.create_appointment_record(&request, start_time, end_time, auth_token).await?;

        schedule_cache().invalidate_tag(&request.therapist_id.to_string());

        info!("Appointment {} booked with therapist {}", appointment.id, request.therapist_id);
        Ok(appointment)
    }

    /// Pre-submit availability check for the booking UI
    pub async fn check_availability(
        &self,
        therapist_id: Uuid,
        date: chrono::NaiveDate,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        self.resolver
            .is_slot_available(therapist_id, date, start_time, end_time, auth_token)
            .await
    }

    /// Get appointment by ID
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.first()
            .ok_or(AppointmentError::NotFound)
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))))
    }

    /// Search appointments with filters
    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(therapist_id) = query.therapist_id {
            query_parts.push(format!("therapist_id=eq.{}", therapist_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            let date_str = from_date.to_rfc3339();
            query_parts.push(format!("start_time=gte.{}", urlencoding::encode(&date_str)));
        }
        if let Some(to_date) = query.to_date {
            let date_str = to_date.to_rfc3339();
            query_parts.push(format!("start_time=lte.{}", urlencoding::encode(&date_str)));
        }

        let mut path = format!("/rest/v1/appointments?{}&order=start_time.asc",
                              query_parts.join("&"));

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    /// Get upcoming pending/confirmed appointments (configurable hours ahead)
    pub async fn get_upcoming_appointments(
        &self,
        patient_id: Option<Uuid>,
        therapist_id: Option<Uuid>,
        hours_ahead: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let now = Utc::now();
        let future_time = now + ChronoDuration::hours(hours_ahead.unwrap_or(24) as i64);

        let query = AppointmentSearchQuery {
            patient_id,
            therapist_id,
            status: None,
            from_date: Some(now),
            to_date: Some(future_time),
            limit: Some(50),
            offset: None,
        };

        let mut appointments = self.search_appointments(query, auth_token).await?;
        appointments.retain(|appointment| appointment.status.is_active());

        Ok(appointments)
    }

    /// Therapist accepts a pending appointment
    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        requester: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Confirming appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !requester.is_admin() && current.therapist_id.to_string() != requester.id {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle.validate_status_transition(&current.status, &AppointmentStatus::Confirmed)?;

        let updated = self.update_status(&current, AppointmentStatus::Confirmed, None, auth_token).await?;
        schedule_cache().invalidate_tag(&current.therapist_id.to_string());

        info!("Appointment {} confirmed", appointment_id);
        Ok(updated)
    }

    /// Cancel an appointment (owning patient, owning therapist, or admin)
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        requester: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        let is_patient_owner = current.patient_id.to_string() == requester.id;
        let is_therapist_owner = current.therapist_id.to_string() == requester.id;
        if !requester.is_admin() && !is_patient_owner && !is_therapist_owner {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle.validate_status_transition(&current.status, &AppointmentStatus::Canceled)?;

        let note = request.reason.map(|reason| format!("Canceled: {}", reason));
        let updated = self.update_status(&current, AppointmentStatus::Canceled, note, auth_token).await?;
        schedule_cache().invalidate_tag(&current.therapist_id.to_string());

        info!("Appointment {} canceled", appointment_id);
        Ok(updated)
    }

    /// Therapist marks a confirmed appointment as completed
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        requester: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Completing appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if !requester.is_admin() && current.therapist_id.to_string() != requester.id {
            return Err(AppointmentError::Unauthorized);
        }

        self.lifecycle.validate_status_transition(&current.status, &AppointmentStatus::Completed)?;

        let updated = self.update_status(&current, AppointmentStatus::Completed, None, auth_token).await?;
        schedule_cache().invalidate_tag(&current.therapist_id.to_string());

        info!("Appointment {} completed", appointment_id);
        Ok(updated)
    }

    /// Status as observed by readers (implicit completion of elapsed
    /// confirmed appointments)
    pub fn effective_status(&self, appointment: &Appointment) -> AppointmentStatus {
        self.lifecycle.effective_status(appointment, Utc::now())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn create_appointment_record(
        &self,
        request: &BookAppointmentRequest,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();

        let appointment_data = json!({
            "patient_id": request.patient_id,
            "therapist_id": request.therapist_id,
            "start_time": start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "status": AppointmentStatus::Pending.to_string(),
            "title": request.title,
            "description": request.description,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(appointment_data),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.first()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse created appointment: {}", e))))
    }

    async fn update_status(
        &self,
        current: &Appointment,
        new_status: AppointmentStatus,
        note: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(new_status.to_string()));
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        if let Some(note) = note {
            let description = match &current.description {
                Some(existing) => format!("{}\n{}", existing, note),
                None => note,
            };
            update_data.insert("description".to_string(), json!(description));
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", current.id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.first()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to update appointment".to_string()))
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse updated appointment: {}", e))))
    }
}
