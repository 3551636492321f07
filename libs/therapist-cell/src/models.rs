// libs/therapist-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveTime};

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// A recurring weekly window during which a therapist accepts bookings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilitySlotRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilitySlotRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_available: Option<bool>,
}

/// Default working hours created for a newly registered therapist:
/// Monday through Friday, 09:00-17:00
pub const DEFAULT_SCHEDULE_DAYS: [i32; 5] = [1, 2, 3, 4, 5];
pub const DEFAULT_SCHEDULE_START: (u32, u32) = (9, 0);
pub const DEFAULT_SCHEDULE_END: (u32, u32) = (17, 0);

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum TherapistError {
    #[error("Availability slot not found")]
    SlotNotFound,

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Day of week must be between 0 (Sunday) and 6 (Saturday), got {0}")]
    InvalidDayOfWeek(i32),

    #[error("Availability slot overlaps an existing slot for this day")]
    OverlappingSlot,

    #[error("Unauthorized access to availability slot")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
