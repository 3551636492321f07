// libs/booking-cell/src/services/resolver.rs
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use std::sync::Arc;
use shared_database::supabase::SupabaseClient;
use shared_utils::cache::schedule_cache;
use therapist_cell::models::AvailabilitySlot;

use crate::models::{Appointment, AppointmentError};
use crate::services::timeslot::{day_of_week, minutes_since_midnight, ranges_overlap};

/// Decides whether a requested time range on a given date can be booked with
/// a therapist: the range must fall entirely within one of the therapist's
/// recurring availability windows for that weekday, and must not overlap any
/// existing pending or confirmed appointment on that date.
pub struct AvailabilityResolver {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityResolver {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Pure read, no mutation. `end_time > start_time` is a precondition and
    /// violating it is an error, never a silent `false`.
    pub async fn is_slot_available(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        if end_time <= start_time {
            return Err(AppointmentError::InvalidTimeRange(
                "end_time must be after start_time".to_string(),
            ));
        }

        debug!("Checking availability for therapist {} on {} from {} to {}",
               therapist_id, date, start_time, end_time);

        let weekday = day_of_week(date);
        let requested_start = minutes_since_midnight(start_time);
        let requested_end = minutes_since_midnight(end_time);

        let slots = self.get_availability_for_day(therapist_id, weekday, auth_token).await?;

        let within_working_hours = slots.iter().any(|slot| {
            minutes_since_midnight(slot.start_time) <= requested_start
                && requested_end <= minutes_since_midnight(slot.end_time)
        });

        if !within_working_hours {
            debug!("Request outside working hours for therapist {} on weekday {}",
                   therapist_id, weekday);
            return Ok(false);
        }

        // Fetched unbounded by date at the source; the date filter below runs
        // against the absolute start_time so boundary skew cannot hide a conflict.
        let appointments = self.get_active_appointments(therapist_id, auth_token).await?;

        for appointment in appointments.iter()
            .filter(|appointment| appointment.status.is_active())
            .filter(|appointment| appointment.start_time.date_naive() == date)
        {
            let existing_start = minutes_since_midnight(appointment.start_time.time());
            let existing_end = minutes_since_midnight(appointment.end_time.time());

            if ranges_overlap(requested_start, requested_end, existing_start, existing_end) {
                debug!("Conflict with appointment {} ({} - {})",
                       appointment.id, appointment.start_time, appointment.end_time);
                return Ok(false);
            }
        }

        Ok(true)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_availability_for_day(
        &self,
        therapist_id: Uuid,
        weekday: i32,
        auth_token: &str,
    ) -> Result<Vec<AvailabilitySlot>, AppointmentError> {
        let cache_key = format!("availability:{}:{}", therapist_id, weekday);

        let raw = match schedule_cache().get(&cache_key) {
            Some(cached) => cached,
            None => {
                let path = format!(
                    "/rest/v1/availability_slots?therapist_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
                    therapist_id, weekday
                );
                let result: Vec<Value> = self.supabase.request(
                    Method::GET,
                    &path,
                    Some(auth_token),
                    None,
                ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

                let raw = Value::Array(result);
                schedule_cache().put(&therapist_id.to_string(), &cache_key, raw.clone());
                raw
            }
        };

        serde_json::from_value(raw)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse availability slots: {}", e)))
    }

    async fn get_active_appointments(
        &self,
        therapist_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let cache_key = format!("appointments:{}:active", therapist_id);

        let raw = match schedule_cache().get(&cache_key) {
            Some(cached) => cached,
            None => {
                let path = format!(
                    "/rest/v1/appointments?therapist_id=eq.{}&status=in.(pending,confirmed)&order=start_time.asc",
                    therapist_id
                );
                let result: Vec<Value> = self.supabase.request(
                    Method::GET,
                    &path,
                    Some(auth_token),
                    None,
                ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

                let raw = Value::Array(result);
                schedule_cache().put(&therapist_id.to_string(), &cache_key, raw.clone());
                raw
            }
        };

        serde_json::from_value(raw)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }
}
