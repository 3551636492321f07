use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use booking_cell::services::resolver::AvailabilityResolver;
use booking_cell::models::AppointmentError;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{TestConfig, MockSupabaseResponses};
use assert_matches::assert_matches;

const TOKEN: &str = "test-token";

// 2025-06-02 is a Monday (day_of_week = 1)
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn time(value: &str) -> chrono::NaiveTime {
    booking_cell::services::timeslot::parse_time_of_day(value).unwrap()
}

async fn create_resolver(mock_server: &MockServer) -> AvailabilityResolver {
    let mut config = TestConfig::default();
    config.supabase_url = mock_server.uri();
    AvailabilityResolver::new(Arc::new(SupabaseClient::new(&config.to_app_config())))
}

async fn mock_availability(mock_server: &MockServer, therapist_id: &str, slots: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("therapist_id", format!("eq.{}", therapist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(slots))
        .mount(mock_server)
        .await;
}

async fn mock_appointments(mock_server: &MockServer, therapist_id: &str, appointments: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("therapist_id", format!("eq.{}", therapist_id)))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appointments))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_no_availability_slots_rejects_any_request() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("10:00"), time("11:00"), TOKEN)
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn test_request_inside_slot_with_no_appointments_is_available() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("10:00"), time("11:00"), TOKEN)
        .await
        .unwrap();

    assert!(available);
}

#[tokio::test]
async fn test_request_outside_working_hours_is_rejected() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("08:00"), time("09:00"), TOKEN)
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn test_request_straddling_slot_boundary_is_rejected() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("16:30"), time("17:30"), TOKEN)
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn test_overlapping_confirmed_appointment_is_rejected() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::appointment_response(
            &patient_id.to_string(), &therapist_id.to_string(),
            "2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z", "confirmed")
    ])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("10:30"), time("11:30"), TOKEN)
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn test_request_enclosing_existing_appointment_is_rejected() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::appointment_response(
            &patient_id.to_string(), &therapist_id.to_string(),
            "2025-06-02T10:00:00Z", "2025-06-02T10:30:00Z", "pending")
    ])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("09:30"), time("11:00"), TOKEN)
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn test_back_to_back_appointment_is_available() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::appointment_response(
            &patient_id.to_string(), &therapist_id.to_string(),
            "2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z", "confirmed")
    ])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("11:00"), time("12:00"), TOKEN)
        .await
        .unwrap();

    assert!(available);
}

#[tokio::test]
async fn test_canceled_appointment_never_conflicts() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    // A canceled row sneaking past the source filter must still not conflict
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::appointment_response(
            &patient_id.to_string(), &therapist_id.to_string(),
            "2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z", "canceled")
    ])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("10:30"), time("11:30"), TOKEN)
        .await
        .unwrap();

    assert!(available);
}

#[tokio::test]
async fn test_appointment_on_other_date_does_not_conflict() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mock_availability(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::availability_slot_response(
            &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
    ])).await;
    // Same time of day, one week later
    mock_appointments(&mock_server, &therapist_id.to_string(), json!([
        MockSupabaseResponses::appointment_response(
            &patient_id.to_string(), &therapist_id.to_string(),
            "2025-06-09T10:00:00Z", "2025-06-09T11:00:00Z", "confirmed")
    ])).await;

    let resolver = create_resolver(&mock_server).await;
    let available = resolver
        .is_slot_available(therapist_id, monday(), time("10:00"), time("11:00"), TOKEN)
        .await
        .unwrap();

    assert!(available);
}

#[tokio::test]
async fn test_inverted_time_range_is_an_error() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    let resolver = create_resolver(&mock_server).await;
    let result = resolver
        .is_slot_available(therapist_id, monday(), time("11:00"), time("10:00"), TOKEN)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTimeRange(_)));
}

#[tokio::test]
async fn test_fetch_failure_propagates_as_database_error() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&mock_server)
        .await;

    let resolver = create_resolver(&mock_server).await;
    let result = resolver
        .is_slot_available(therapist_id, monday(), time("10:00"), time("11:00"), TOKEN)
        .await;

    assert_matches!(result, Err(AppointmentError::DatabaseError(_)));
}
