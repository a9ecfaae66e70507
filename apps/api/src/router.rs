use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::appointment_routes;
use scheduling_cell::SchedulingEngine;

pub fn create_router(engine: Arc<SchedulingEngine>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/api/appointments", appointment_routes(engine))
}
