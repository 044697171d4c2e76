//! Appointment ledger: booking, rescheduling, cancellation, administrator
//! updates and facility listings.
//!
//! Status flow: pending → confirmed → completed, with cancellation allowed
//! from pending or confirmed. Rescheduling always returns to pending.
//! Payment only moves unpaid → paid.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{require_facility_admin, resolve_facility_scope};
use crate::db::{self, now_utc};
use crate::error::CareError;
use crate::models::*;
use crate::session::Session;
use crate::wallet::MAX_AMOUNT;

// ═══════════════════════════════════════════════════════════
// Validation helpers
// ═══════════════════════════════════════════════════════════

fn require_date(date: Option<NaiveDate>) -> Result<NaiveDate, CareError> {
    date.ok_or_else(|| CareError::InvalidInput("date is required".into()))
}

/// Normalises to zero-padded `HH:MM`.
fn require_time(time: Option<&str>) -> Result<String, CareError> {
    let raw = time
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CareError::InvalidInput("time is required".into()))?;
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| CareError::InvalidInput(format!("time must be HH:MM, got {raw}")))?;
    Ok(parsed.format("%H:%M").to_string())
}

/// A meeting link is only meaningful for a confirmed virtual appointment.
fn meeting_link_allowed(appt: &Appointment) -> bool {
    appt.appointment_type == AppointmentType::Virtual
        && appt.status == AppointmentStatus::Confirmed
}

// ═══════════════════════════════════════════════════════════
// Patient operations
// ═══════════════════════════════════════════════════════════

/// Book a new appointment for the signed-in patient.
///
/// The patient's name, email and image are copied onto the appointment and
/// are not refreshed by later profile edits.
pub fn book_appointment(
    conn: &Connection,
    session: &Session,
    request: BookingRequest,
) -> Result<Appointment, CareError> {
    let patient_id = session.require_patient()?;
    let date = require_date(request.date)?;
    let time = require_time(request.time.as_deref())?;
    let patient = db::require_account(conn, &patient_id)?;

    let now = now_utc();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id,
        appointment_type: request.appointment_type,
        date,
        time,
        message: request.message.trim().to_string(),
        doctor_note: None,
        status: AppointmentStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        amount: 0,
        doctor_name: None,
        meeting_link: None,
        patient_name: patient.name,
        patient_email: patient.email,
        patient_image: patient.profile_image,
        created_at: now,
        updated_at: now,
        version: 1,
    };
    db::insert_appointment(conn, &appointment)?;

    tracing::info!(
        appointment_id = %appointment.id,
        patient_id = %patient_id,
        kind = %appointment.appointment_type,
        "Appointment booked"
    );
    Ok(appointment)
}

/// Move an appointment to a new slot. Status returns to pending and any
/// meeting link is dropped; the id is kept.
pub fn reschedule_appointment(
    conn: &Connection,
    session: &Session,
    appointment_id: &Uuid,
    request: RescheduleRequest,
) -> Result<Appointment, CareError> {
    let patient_id = session.require_patient()?;
    let date = require_date(request.date)?;
    let time = require_time(request.time.as_deref())?;

    let mut appointment = db::get_patient_appointment(conn, &patient_id, appointment_id)?;
    let expected = request.expected_version.unwrap_or(appointment.version);

    appointment.appointment_type = request.appointment_type;
    appointment.date = date;
    appointment.time = time;
    appointment.message = request.message.trim().to_string();
    appointment.status = AppointmentStatus::Pending;
    appointment.meeting_link = None;
    appointment.updated_at = now_utc();
    appointment.version = db::update_appointment(conn, &appointment, expected)?;

    tracing::info!(
        appointment_id = %appointment.id,
        date = %appointment.date,
        time = %appointment.time,
        "Appointment rescheduled"
    );
    Ok(appointment)
}

/// Delete one of the caller's appointments. Paid appointments are kept
/// because a wallet payment refers to them.
pub fn cancel_appointment(
    conn: &Connection,
    session: &Session,
    appointment_id: &Uuid,
) -> Result<(), CareError> {
    let patient_id = session.require_patient()?;
    let appointment = db::get_patient_appointment(conn, &patient_id, appointment_id)?;
    if appointment.payment_status == PaymentStatus::Paid {
        return Err(CareError::InvalidInput(
            "paid appointments cannot be cancelled".into(),
        ));
    }
    db::delete_appointment(conn, &patient_id, appointment_id)?;
    tracing::info!(appointment_id = %appointment_id, "Appointment cancelled");
    Ok(())
}

/// The signed-in patient's appointments in booking order.
pub fn list_my_appointments(
    conn: &Connection,
    session: &Session,
) -> Result<Vec<Appointment>, CareError> {
    let patient_id = session.require_patient()?;
    Ok(db::list_patient_appointments(conn, &patient_id)?)
}

// ═══════════════════════════════════════════════════════════
// Administrator operations
// ═══════════════════════════════════════════════════════════

/// Apply an administrator edit. Only the fields present in `update` change.
pub fn admin_update_appointment(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
    appointment_id: &Uuid,
    update: AppointmentUpdate,
) -> Result<Appointment, CareError> {
    let patient = db::require_account(conn, patient_id)?;
    require_facility_admin(session, &patient)?;

    let mut appointment = db::get_patient_appointment(conn, patient_id, appointment_id)?;
    let expected = update.expected_version.unwrap_or(appointment.version);

    if let Some(status) = update.status {
        if !appointment.status.can_transition_to(status) {
            return Err(CareError::InvalidInput(format!(
                "cannot move appointment from {} to {status}",
                appointment.status
            )));
        }
        appointment.status = status;
    }
    // Checked against the payment status before this edit.
    if let Some(amount) = update.amount {
        if !(0..=MAX_AMOUNT).contains(&amount) {
            return Err(CareError::InvalidInput(format!(
                "amount must be between 0 and ₦{MAX_AMOUNT}, got {amount}"
            )));
        }
        if appointment.payment_status == PaymentStatus::Paid && amount != appointment.amount {
            return Err(CareError::InvalidInput(
                "amount of a paid appointment is fixed".into(),
            ));
        }
        appointment.amount = amount;
    }
    if let Some(payment) = update.payment_status {
        if !appointment.payment_status.can_transition_to(payment) {
            return Err(CareError::InvalidInput(
                "a paid appointment cannot become unpaid".into(),
            ));
        }
        appointment.payment_status = payment;
    }
    if let Some(doctor) = update.doctor_name {
        appointment.doctor_name = Some(doctor.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(note) = update.doctor_note {
        appointment.doctor_note = Some(note.trim().to_string()).filter(|n| !n.is_empty());
    }
    if let Some(link) = update.meeting_link {
        let link = link.trim().to_string();
        if link.is_empty() {
            appointment.meeting_link = None;
        } else if meeting_link_allowed(&appointment) {
            appointment.meeting_link = Some(link);
        } else {
            return Err(CareError::InvalidInput(
                "meeting links are only for confirmed virtual appointments".into(),
            ));
        }
    }
    if !meeting_link_allowed(&appointment) {
        appointment.meeting_link = None;
    }

    appointment.updated_at = now_utc();
    appointment.version = db::update_appointment(conn, &appointment, expected)?;

    tracing::info!(
        appointment_id = %appointment.id,
        status = %appointment.status,
        payment = %appointment.payment_status,
        amount = appointment.amount,
        "Appointment updated by administrator"
    );
    Ok(appointment)
}

/// Appointments of every patient in `facility_id`, newest first.
pub fn list_appointments_for_facility(
    conn: &Connection,
    session: &Session,
    facility_id: &Uuid,
) -> Result<Vec<FacilityAppointment>, CareError> {
    let facility = resolve_facility_scope(session, Some(*facility_id))?;
    Ok(db::list_appointments(
        conn,
        &AppointmentFilter {
            facility_id: Some(facility),
            patient_id: None,
        },
    )?)
}

/// Every appointment the caller administers.
pub fn list_all_appointments(
    conn: &Connection,
    session: &Session,
) -> Result<Vec<FacilityAppointment>, CareError> {
    let facility = resolve_facility_scope(session, None)?;
    list_appointments_for_facility(conn, session, &facility)
}
