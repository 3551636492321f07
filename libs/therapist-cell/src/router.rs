// libs/therapist-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch, delete},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // All schedule management requires authentication
    let protected_routes = Router::new()
        .route("/therapists/{therapist_id}", post(handlers::create_slot))
        .route("/therapists/{therapist_id}", get(handlers::list_slots))
        .route("/therapists/{therapist_id}/default", post(handlers::create_default_schedule))
        .route("/slots/{slot_id}", patch(handlers::update_slot))
        .route("/slots/{slot_id}", delete(handlers::delete_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
