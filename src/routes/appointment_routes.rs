// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{authorize, Capability},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, Appointment},
    scheduling::{AppointmentPatch, LedgerEvent, NewAppointment, ProposedSlot},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments/propose", post(propose_slot))
        .route("/appointments/week", get(get_appointments_week))
        .route("/appointments", post(create_appointment).get(query_appointments))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment).patch(patch_appointment).delete(delete_appointment),
        )
        .route("/appointments/{appointment_id}/ledger_events", post(post_ledger_event))
}

/* ============================================================
   Response DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* ============================================================
   Request / query params
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub practitioner_id: Option<Uuid>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: String,
    pub end: String,
    pub timezone: Option<String>,
    pub practitioner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    // YYYY-MM-DD, interpreted in `timezone`
    pub start: String,
    pub days: Option<i64>,
    pub timezone: Option<String>,
    pub practitioner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TimezoneQuery {
    pub timezone: Option<String>,
}

fn validation(msg: &str) -> ApiError {
    ApiError::BadRequest("VALIDATION_ERROR", msg.into())
}

/* ============================================================
   POST /appointments/propose
   ============================================================ */

pub async fn propose_slot(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<ApiOk<ProposedSlot>>, ApiError> {
    let practitioner_id = req
        .practitioner_id
        .ok_or_else(|| validation("practitioner_id is required"))?;
    let start = req.start_time.ok_or_else(|| validation("start_time is required"))?;
    let end = req.end_time.ok_or_else(|| validation("end_time is required"))?;

    let slot = state
        .engine
        .propose_slot(practitioner_id, &start, &end, req.timezone.as_deref())
        .await?;

    Ok(Json(ApiOk { data: slot }))
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NewAppointment>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appointment = state.engine.create_appointment(&auth.caller, req).await?;
    Ok(Json(ApiOk { data: appointment }))
}

/* ============================================================
   GET /appointments?start&end
   ============================================================ */

pub async fn query_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<RangeQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let rows = state
        .engine
        .query_range(&auth.caller, &q.start, &q.end, q.timezone.as_deref(), q.practitioner_id)
        .await?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /appointments/week
   ============================================================ */

pub async fn get_appointments_week(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<WeekQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let start_date = NaiveDate::parse_from_str(q.start.trim(), "%Y-%m-%d")
        .map_err(|_| validation("start must be YYYY-MM-DD"))?;

    let rows = state
        .engine
        .week_view(
            &auth.caller,
            start_date,
            q.days.unwrap_or(7),
            q.timezone.as_deref(),
            q.practitioner_id,
        )
        .await?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET / PATCH / DELETE /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appointment = state.engine.get_appointment(&auth.caller, appointment_id).await?;
    Ok(Json(ApiOk { data: appointment }))
}

/// Time fields are read in the body's `timezone`, else `?timezone=`, else the default zone.
pub async fn patch_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Query(tz): Query<TimezoneQuery>,
    Json(patch): Json<AppointmentPatch>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let appointment = state
        .engine
        .update_appointment(&auth.caller, appointment_id, patch, tz.timezone.as_deref())
        .await?;
    Ok(Json(ApiOk { data: appointment }))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    state.engine.delete_appointment(&auth.caller, appointment_id).await?;
    Ok(Json(ApiOk { data: OkData { ok: true } }))
}

/* ============================================================
   POST /appointments/{id}/ledger_events
   ============================================================ */

pub async fn post_ledger_event(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(event): Json<LedgerEvent>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    authorize(&auth.caller, Capability::Update)?;
    let appointment = state.engine.apply_ledger_event(appointment_id, &event).await?;
    Ok(Json(ApiOk { data: appointment }))
}
