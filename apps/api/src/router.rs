use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use booking_cell::router::appointment_routes;
use therapist_cell::router::availability_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "AmbitiousCare API is running!" }))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
}
