// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::caller_middleware;

use crate::handlers;
use crate::services::engine::SchedulingEngine;

pub fn appointment_routes(engine: Arc<SchedulingEngine>) -> Router {
    // Every scheduling operation requires a resolved caller context.
    let protected_routes = Router::new()
        .route("/book-slot", post(handlers::book_slot))
        .route("/{practitioner_id}/create-slot", post(handlers::create_slot))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}", put(handlers::reschedule_appointment))
        .route("/{appointment_id}/comment", patch(handlers::update_comment))
        // Calendar views
        .route("/calendar/{practitioner_id}", get(handlers::weekly_calendar))
        .route(
            "/public/calendar/{practitioner_id}",
            get(handlers::public_weekly_calendar),
        )
        // Listings and reporting
        .route("/my", get(handlers::my_appointments))
        .route("/patient-history/{patient_id}", get(handlers::patient_history))
        .route(
            "/patient-history/{patient_id}/count",
            get(handlers::patient_history_count),
        )
        .route(
            "/statistics/{practitioner_id}",
            get(handlers::practitioner_statistics),
        )
        .route("/next-free-slots", get(handlers::next_free_slots))
        .layer(middleware::from_fn(caller_middleware));

    Router::new().merge(protected_routes).with_state(engine)
}
