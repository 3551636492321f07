// libs/booking-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentStatus, AppointmentError};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        let valid_transitions = self.get_valid_transitions(current_status);

        if !valid_transitions.contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition(*current_status));
        }

        Ok(())
    }

    /// All valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Canceled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Canceled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Canceled => vec![],
            AppointmentStatus::Completed => vec![],
        }
    }

    /// Status as observed by readers: a confirmed appointment whose end time
    /// has passed reads as completed without a write-back.
    pub fn effective_status(
        &self,
        appointment: &Appointment,
        now: DateTime<Utc>,
    ) -> AppointmentStatus {
        if appointment.status == AppointmentStatus::Confirmed && appointment.end_time <= now {
            AppointmentStatus::Completed
        } else {
            appointment.status
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn appointment_with(status: AppointmentStatus, end_time: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            therapist_id: Uuid::new_v4(),
            start_time: end_time - Duration::hours(1),
            end_time,
            status,
            title: "Therapy session".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_pending_can_be_confirmed_or_canceled() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Pending, &AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Pending, &AppointmentStatus::Canceled).is_ok());
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Pending, &AppointmentStatus::Completed).is_err());
    }

    #[test]
    fn test_confirmed_can_be_completed_or_canceled() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Confirmed, &AppointmentStatus::Completed).is_ok());
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Confirmed, &AppointmentStatus::Canceled).is_ok());
        assert!(lifecycle.validate_status_transition(
            &AppointmentStatus::Confirmed, &AppointmentStatus::Pending).is_err());
    }

    #[test]
    fn test_terminal_states_allow_no_transitions() {
        let lifecycle = AppointmentLifecycleService::new();
        for terminal in [AppointmentStatus::Canceled, AppointmentStatus::Completed] {
            assert!(lifecycle.get_valid_transitions(&terminal).is_empty());
            assert!(lifecycle.validate_status_transition(
                &terminal, &AppointmentStatus::Confirmed).is_err());
        }
    }

    #[test]
    fn test_effective_status_completes_elapsed_confirmed() {
        let lifecycle = AppointmentLifecycleService::new();
        let now = Utc::now();

        let elapsed = appointment_with(AppointmentStatus::Confirmed, now - Duration::minutes(5));
        assert_eq!(lifecycle.effective_status(&elapsed, now), AppointmentStatus::Completed);

        let upcoming = appointment_with(AppointmentStatus::Confirmed, now + Duration::hours(1));
        assert_eq!(lifecycle.effective_status(&upcoming, now), AppointmentStatus::Confirmed);

        // Pending appointments are never implicitly completed
        let stale_pending = appointment_with(AppointmentStatus::Pending, now - Duration::hours(1));
        assert_eq!(lifecycle.effective_status(&stale_pending, now), AppointmentStatus::Pending);
    }
}
