// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::CallerContext;
use shared_models::error::AppError;

use crate::models::{
    BookSlotRequest, CreateSlotRequest, RescheduleRequest, SchedulingError, StatsPeriod,
    UpdateCommentRequest,
};
use crate::services::engine::SchedulingEngine;

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        match e {
            SchedulingError::PractitionerNotFound
            | SchedulingError::ClientNotFound
            | SchedulingError::SlotNotFound => AppError::NotFound(e.to_string()),
            SchedulingError::NotAPractitioner => AppError::BadRequest(e.to_string()),
            SchedulingError::Forbidden => AppError::Forbidden(e.to_string()),
            SchedulingError::SlotUnavailable | SchedulingError::SlotAlreadyBooked => {
                AppError::Conflict(e.to_string())
            }
            SchedulingError::NotBooked
            | SchedulingError::WindowClosed(_)
            | SchedulingError::ChangeLimitExceeded(_)
            | SchedulingError::DailyBookingLimitReached(_)
            | SchedulingError::BookingRateLimitReached(_)
            | SchedulingError::HourlyOverlapLimitReached(_) => AppError::BadRequest(e.to_string()),
            SchedulingError::InvalidDuration => AppError::ValidationError(e.to_string()),
            SchedulingError::InvariantViolation(_) => AppError::Internal(e.to_string()),
            SchedulingError::Store(_) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct CalendarQueryParams {
    pub week_start: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub size: usize,
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQueryParams {
    pub period: Option<String>,
    pub frame_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct NextFreeSlotsQueryParams {
    pub required_minutes: Option<i32>,
}

// ==============================================================================
// MUTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_slot(
    State(engine): State<Arc<SchedulingEngine>>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        "Book slot request: practitioner={}, time={}, caller={}",
        request.practitioner_id,
        request.time,
        caller.identity
    );

    let appointment = engine.book_slot(request, &caller).await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn create_slot(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(practitioner_id): Path<Uuid>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&caller)?;
    tracing::info!(
        "Create slot request: practitioner={}, time={}",
        practitioner_id,
        request.time
    );

    let slot = engine.create_slot(practitioner_id, request).await?;
    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        "Cancel appointment request: appointment={}, caller={}",
        appointment_id,
        caller.identity
    );

    engine.cancel_appointment(appointment_id, &caller).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    tracing::info!(
        "Reschedule request: appointment={}, new_time={}, caller={}",
        appointment_id,
        request.new_time,
        caller.identity
    );

    let appointment = engine
        .reschedule_appointment(appointment_id, request.new_time, &caller)
        .await?;
    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_comment(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(appointment_id): Path<Uuid>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<Value>, AppError> {
    engine
        .update_comment(appointment_id, request.comment, &caller)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Comment updated successfully"
    })))
}

// ==============================================================================
// VIEW HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn weekly_calendar(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(practitioner_id): Path<Uuid>,
    Query(params): Query<CalendarQueryParams>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&caller)?;

    let slots = engine
        .weekly_calendar(practitioner_id, params.week_start)
        .await?;
    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn public_weekly_calendar(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(practitioner_id): Path<Uuid>,
    Query(params): Query<CalendarQueryParams>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    let slots = engine
        .public_weekly_calendar(practitioner_id, params.week_start, caller.identity)
        .await?;
    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(engine): State<Arc<SchedulingEngine>>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    let categories = engine
        .appointments_by_time_categories(caller.identity)
        .await?;
    Ok(Json(json!(categories)))
}

#[axum::debug_handler]
pub async fn patient_history(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<HistoryQueryParams>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&caller)?;
    if params.size == 0 {
        return Err(AppError::ValidationError(
            "Page size must be at least 1".to_string(),
        ));
    }

    let history = engine
        .patient_history(patient_id, params.page, params.size)
        .await?;
    Ok(Json(json!(history)))
}

#[axum::debug_handler]
pub async fn patient_history_count(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(patient_id): Path<Uuid>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&caller)?;

    let count = engine.patient_history_count(patient_id).await?;
    Ok(Json(json!(count)))
}

#[axum::debug_handler]
pub async fn practitioner_statistics(
    State(engine): State<Arc<SchedulingEngine>>,
    Path(practitioner_id): Path<Uuid>,
    Query(params): Query<StatisticsQueryParams>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    require_privileged(&caller)?;

    let period: StatsPeriod = params
        .period
        .as_deref()
        .unwrap_or("week")
        .parse()
        .map_err(AppError::BadRequest)?;

    let statistics = engine
        .practitioner_statistics(practitioner_id, period, params.frame_start)
        .await?;
    Ok(Json(json!(statistics)))
}

#[axum::debug_handler]
pub async fn next_free_slots(
    State(engine): State<Arc<SchedulingEngine>>,
    Query(params): Query<NextFreeSlotsQueryParams>,
    Extension(_caller): Extension<CallerContext>,
) -> Result<Json<Value>, AppError> {
    let required_minutes = params.required_minutes.unwrap_or(30);

    let slots = engine.next_free_slots(required_minutes).await?;
    Ok(Json(json!(slots)))
}

fn require_privileged(caller: &CallerContext) -> Result<(), AppError> {
    if !caller.privileged {
        return Err(AppError::Forbidden(
            "Operation requires a staff role".to_string(),
        ));
    }
    Ok(())
}
