use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use booking_cell::router::appointment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: AppConfig) -> Router {
    appointment_routes(Arc::new(config))
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_request_without_token_is_rejected() {
    let config = TestConfig::default();
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upcoming")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_with_malformed_token_is_rejected() {
    let config = TestConfig::default();
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/upcoming")
                .header("Authorization", format!("Bearer {}", JwtTestUtils::create_malformed_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_check_availability_endpoint() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .and(query_param("therapist_id", format!("eq.{}", therapist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_slot_response(
                &therapist_id.to_string(), 1, "09:00:00", "17:00:00")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let mut config = TestConfig::default();
    config.supabase_url = mock_server.uri();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());

    // 2025-06-02 is a Monday
    let uri = format!(
        "/availability/check?therapist_id={}&date=2025-06-02&start_time=10:00&end_time=11:00",
        therapist_id
    );
    let response = app
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["available"], json!(true));
}

#[tokio::test]
async fn test_check_availability_with_inverted_range_is_bad_request() {
    let config = TestConfig::default();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());

    let uri = format!(
        "/availability/check?therapist_id={}&date=2025-06-02&start_time=11:00&end_time=10:00",
        Uuid::new_v4()
    );
    let response = app
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_for_another_patient_is_rejected() {
    let config = TestConfig::default();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let app = create_test_app(config.to_app_config());

    let request_body = json!({
        "patient_id": Uuid::new_v4(),
        "therapist_id": Uuid::new_v4(),
        "date": "2025-06-02",
        "start_time": "10:00:00",
        "end_time": "11:00:00",
        "title": "Therapy session",
        "description": null
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
