// libs/therapist-cell/src/services/availability.rs

use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::cache::schedule_cache;

use crate::models::{
    AvailabilitySlot, CreateAvailabilitySlotRequest, UpdateAvailabilitySlotRequest,
    TherapistError, DEFAULT_SCHEDULE_DAYS, DEFAULT_SCHEDULE_START, DEFAULT_SCHEDULE_END,
};

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a recurring weekly availability slot for a therapist
    pub async fn create_slot(
        &self,
        therapist_id: Uuid,
        request: CreateAvailabilitySlotRequest,
        auth_token: &str,
    ) -> Result<AvailabilitySlot, TherapistError> {
        debug!("Creating availability slot for therapist {}", therapist_id);

        if request.start_time >= request.end_time {
            return Err(TherapistError::InvalidTimeRange(
                "start_time must be before end_time".to_string(),
            ));
        }

        if !(0..=6).contains(&request.day_of_week) {
            return Err(TherapistError::InvalidDayOfWeek(request.day_of_week));
        }

        self.check_slot_overlap(
            therapist_id,
            request.day_of_week,
            request.start_time,
            request.end_time,
            None,
            auth_token,
        ).await?;

        let slot_data = json!({
            "therapist_id": therapist_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "is_available": request.is_available.unwrap_or(true),
            "created_at": Utc::now().to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/availability_slots",
            Some(auth_token),
            Some(slot_data),
            Some(headers),
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let slot: AvailabilitySlot = result.first()
            .ok_or_else(|| TherapistError::DatabaseError("Failed to create availability slot".to_string()))
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slot: {}", e))))?;

        schedule_cache().invalidate_tag(&therapist_id.to_string());
        debug!("Availability slot created with ID: {}", slot.id);

        Ok(slot)
    }

    /// Partially update an availability slot owned by the therapist
    pub async fn update_slot(
        &self,
        slot_id: Uuid,
        request: UpdateAvailabilitySlotRequest,
        requester_id: &str,
        is_admin: bool,
        auth_token: &str,
    ) -> Result<AvailabilitySlot, TherapistError> {
        debug!("Updating availability slot {}", slot_id);

        let current = self.get_slot_by_id(slot_id, auth_token).await?;

        if !is_admin && current.therapist_id.to_string() != requester_id {
            return Err(TherapistError::Unauthorized);
        }

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);

        if start_time >= end_time {
            return Err(TherapistError::InvalidTimeRange(
                "start_time must be before end_time".to_string(),
            ));
        }

        if request.start_time.is_some() || request.end_time.is_some() {
            self.check_slot_overlap(
                current.therapist_id,
                current.day_of_week,
                start_time,
                end_time,
                Some(slot_id),
                auth_token,
            ).await?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(start) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start.format("%H:%M:%S").to_string()));
        }
        if let Some(end) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end.format("%H:%M:%S").to_string()));
        }
        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }

        let path = format!("/rest/v1/availability_slots?id=eq.{}", slot_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(headers),
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let updated: AvailabilitySlot = result.first()
            .ok_or_else(|| TherapistError::DatabaseError("Failed to update availability slot".to_string()))
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slot: {}", e))))?;

        schedule_cache().invalidate_tag(&current.therapist_id.to_string());

        Ok(updated)
    }

    /// Delete an availability slot owned by the therapist
    pub async fn delete_slot(
        &self,
        slot_id: Uuid,
        requester_id: &str,
        is_admin: bool,
        auth_token: &str,
    ) -> Result<(), TherapistError> {
        debug!("Deleting availability slot {}", slot_id);

        let current = self.get_slot_by_id(slot_id, auth_token).await?;

        if !is_admin && current.therapist_id.to_string() != requester_id {
            return Err(TherapistError::Unauthorized);
        }

        let path = format!("/rest/v1/availability_slots?id=eq.{}", slot_id);
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        schedule_cache().invalidate_tag(&current.therapist_id.to_string());

        Ok(())
    }

    /// Get a therapist's weekly recurring schedule
    pub async fn list_slots(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, TherapistError> {
        debug!("Fetching availability slots for therapist {}", therapist_id);

        let path = format!(
            "/rest/v1/availability_slots?therapist_id=eq.{}&order=day_of_week.asc,start_time.asc",
            therapist_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let slots: Vec<AvailabilitySlot> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilitySlot>, _>>()
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slots: {}", e)))?;

        Ok(slots)
    }

    /// Create the registration default schedule (Mon-Fri 09:00-17:00).
    /// A no-op when the therapist already has slots.
    pub async fn create_default_schedule(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, TherapistError> {
        debug!("Creating default schedule for therapist {}", therapist_id);

        let existing = self.list_slots(therapist_id, auth_token).await?;
        if !existing.is_empty() {
            debug!("Therapist {} already has {} slots, skipping defaults", therapist_id, existing.len());
            return Ok(existing);
        }

        let (start_h, start_m) = DEFAULT_SCHEDULE_START;
        let (end_h, end_m) = DEFAULT_SCHEDULE_END;
        let start = NaiveTime::from_hms_opt(start_h, start_m, 0).unwrap();
        let end = NaiveTime::from_hms_opt(end_h, end_m, 0).unwrap();
        let now = Utc::now().to_rfc3339();

        let rows: Vec<Value> = DEFAULT_SCHEDULE_DAYS.iter().map(|day| json!({
            "therapist_id": therapist_id,
            "day_of_week": day,
            "start_time": start.format("%H:%M:%S").to_string(),
            "end_time": end.format("%H:%M:%S").to_string(),
            "is_available": true,
            "created_at": now
        })).collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/availability_slots",
            Some(auth_token),
            Some(Value::Array(rows)),
            Some(headers),
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        let slots: Vec<AvailabilitySlot> = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilitySlot>, _>>()
            .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slots: {}", e)))?;

        schedule_cache().invalidate_tag(&therapist_id.to_string());

        Ok(slots)
    }

    // Private helper methods

    async fn get_slot_by_id(
        &self,
        slot_id: Uuid,
        auth_token: &str,
    ) -> Result<AvailabilitySlot, TherapistError> {
        let path = format!("/rest/v1/availability_slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        result.first()
            .ok_or(TherapistError::SlotNotFound)
            .and_then(|value| serde_json::from_value(value.clone())
                .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slot: {}", e))))
    }

    async fn check_slot_overlap(
        &self,
        therapist_id: Uuid,
        day_of_week: i32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), TherapistError> {
        let mut path = format!(
            "/rest/v1/availability_slots?therapist_id=eq.{}&day_of_week=eq.{}",
            therapist_id, day_of_week
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| TherapistError::DatabaseError(e.to_string()))?;

        for slot in existing {
            let existing_slot: AvailabilitySlot = serde_json::from_value(slot)
                .map_err(|e| TherapistError::DatabaseError(format!("Failed to parse slot: {}", e)))?;

            if start_time < existing_slot.end_time && end_time > existing_slot.start_time {
                return Err(TherapistError::OverlappingSlot);
            }
        }

        Ok(())
    }
}
