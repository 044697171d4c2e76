//! Appointment endpoints.
//!
//! Patient:
//! - `GET /api/appointments` — own appointments
//! - `POST /api/appointments` — book
//! - `PUT /api/appointments/:id` — reschedule (back to pending)
//! - `DELETE /api/appointments/:id` — cancel and remove
//!
//! Administrator:
//! - `GET /api/admin/appointments` — own facility
//! - `GET /api/admin/facilities/:facility_id/appointments`
//! - `PATCH /api/admin/patients/:patient_id/appointments/:id`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, JsonBody};
use crate::appointment;
use crate::models::{
    Appointment, AppointmentUpdate, BookingRequest, FacilityAppointment, RescheduleRequest,
};

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub appointment: Appointment,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Serialize)]
pub struct FacilityAppointmentsResponse {
    pub appointments: Vec<FacilityAppointment>,
}

/// `GET /api/appointments`
pub async fn list_mine(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let appointments = ctx
        .with_db(move |_, conn| appointment::list_my_appointments(conn, &auth.session))
        .await?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `POST /api/appointments`
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    JsonBody(request): JsonBody<BookingRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), ApiError> {
    let appointment = ctx
        .with_db(move |_, conn| appointment::book_appointment(conn, &auth.session, request))
        .await?;
    Ok((StatusCode::CREATED, Json(AppointmentResponse { appointment })))
}

/// `PUT /api/appointments/:id`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<RescheduleRequest>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = ctx
        .with_db(move |_, conn| {
            appointment::reschedule_appointment(conn, &auth.session, &id, request)
        })
        .await?;
    Ok(Json(AppointmentResponse { appointment }))
}

/// `DELETE /api/appointments/:id`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.with_db(move |_, conn| appointment::cancel_appointment(conn, &auth.session, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/appointments`
pub async fn list_facility(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<FacilityAppointmentsResponse>, ApiError> {
    let appointments = ctx
        .with_db(move |_, conn| appointment::list_all_appointments(conn, &auth.session))
        .await?;
    Ok(Json(FacilityAppointmentsResponse { appointments }))
}

/// `GET /api/admin/facilities/:facility_id/appointments`
pub async fn list_for_facility(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(facility_id): Path<Uuid>,
) -> Result<Json<FacilityAppointmentsResponse>, ApiError> {
    let appointments = ctx
        .with_db(move |_, conn| {
            appointment::list_appointments_for_facility(conn, &auth.session, &facility_id)
        })
        .await?;
    Ok(Json(FacilityAppointmentsResponse { appointments }))
}

/// `PATCH /api/admin/patients/:patient_id/appointments/:id`
pub async fn admin_update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path((patient_id, id)): Path<(Uuid, Uuid)>,
    JsonBody(update): JsonBody<AppointmentUpdate>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment = ctx
        .with_db(move |_, conn| {
            appointment::admin_update_appointment(conn, &auth.session, &patient_id, &id, update)
        })
        .await?;
    Ok(Json(AppointmentResponse { appointment }))
}
