//! Administrative reporting: facility summary counts, recent-activity feed
//! and per-patient overview.
//!
//! The aggregations are pure functions over loaded rows; the `admin_*`
//! wrappers load a facility's rows and recompute on every call.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::require_account_access;
use crate::db;
use crate::error::CareError;
use crate::models::*;
use crate::session::Session;

/// Upper bound on a single activity page.
pub const MAX_ACTIVITY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub users: usize,
    pub doctors: usize,
    pub appointments: usize,
    /// Naira collected from paid appointments.
    pub revenue: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    User,
    Doctor,
    Appointment,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub subject_id: Uuid,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatientOverview {
    pub total: usize,
    pub completed: usize,
    /// Pending plus confirmed.
    pub upcoming: usize,
}

/// Ids of the patients that belong to `facility`.
fn facility_patients(accounts: &[Account], facility: &Uuid) -> HashSet<Uuid> {
    accounts
        .iter()
        .filter(|a| a.role == Role::Patient && a.facility_id.as_ref() == Some(facility))
        .map(|a| a.id)
        .collect()
}

// ═══════════════════════════════════════════════════════════
// Pure aggregations
// ═══════════════════════════════════════════════════════════

pub fn summarize(accounts: &[Account], appointments: &[Appointment], facility: &Uuid) -> AdminStats {
    let patients = facility_patients(accounts, facility);
    let doctors = accounts
        .iter()
        .filter(|a| a.role == Role::Doctor && a.facility_id.as_ref() == Some(facility))
        .count();
    let scoped: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| patients.contains(&a.patient_id))
        .collect();
    let revenue = scoped
        .iter()
        .filter(|a| a.payment_status == PaymentStatus::Paid)
        .fold(0i64, |total, a| total.saturating_add(a.amount));

    AdminStats {
        users: patients.len(),
        doctors,
        appointments: scoped.len(),
        revenue,
    }
}

/// Newest-first feed of sign-ups, bookings and payments in `facility`.
pub fn recent_activity(
    accounts: &[Account],
    appointments: &[Appointment],
    transactions: &[WalletTransaction],
    facility: &Uuid,
    limit: usize,
) -> Vec<ActivityEvent> {
    let patients = facility_patients(accounts, facility);
    let mut events = Vec::new();

    for account in accounts.iter().filter(|a| a.facility_id.as_ref() == Some(facility)) {
        let kind = match account.role {
            Role::Patient => ActivityKind::User,
            Role::Doctor => ActivityKind::Doctor,
            Role::Admin => continue,
        };
        let label = if kind == ActivityKind::User { "patient" } else { "doctor" };
        events.push(ActivityEvent {
            kind,
            subject_id: account.id,
            description: format!("New {label} added: {}", account.name),
            timestamp: account.created_at,
        });
    }

    for appt in appointments.iter().filter(|a| patients.contains(&a.patient_id)) {
        events.push(ActivityEvent {
            kind: ActivityKind::Appointment,
            subject_id: appt.id,
            description: format!(
                "{} booked a {} appointment for {} {}",
                appt.patient_name, appt.appointment_type, appt.date, appt.time
            ),
            timestamp: appt.created_at,
        });
    }

    for tx in transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Payment && patients.contains(&t.account_id))
    {
        events.push(ActivityEvent {
            kind: ActivityKind::Payment,
            subject_id: tx.id,
            description: format!("Payment of ₦{} via {}", -tx.amount, tx.method),
            timestamp: tx.timestamp,
        });
    }

    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    events
}

pub fn patient_overview(appointments: &[Appointment]) -> PatientOverview {
    PatientOverview {
        total: appointments.len(),
        completed: appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Completed)
            .count(),
        upcoming: appointments.iter().filter(|a| a.status.is_upcoming()).count(),
    }
}

// ═══════════════════════════════════════════════════════════
// Loaders
// ═══════════════════════════════════════════════════════════

fn load_facility(
    conn: &Connection,
    facility: &Uuid,
) -> Result<(Vec<Account>, Vec<Appointment>), CareError> {
    let accounts = db::list_accounts(
        conn,
        &AccountFilter {
            facility_id: Some(*facility),
            role: None,
        },
    )?;
    let appointments = db::list_appointments(
        conn,
        &AppointmentFilter {
            facility_id: Some(*facility),
            patient_id: None,
        },
    )?
    .into_iter()
    .map(|fa| fa.appointment)
    .collect();
    Ok((accounts, appointments))
}

pub fn admin_stats(conn: &Connection, session: &Session) -> Result<AdminStats, CareError> {
    let facility = session.require_admin()?;
    let (accounts, appointments) = load_facility(conn, &facility)?;
    Ok(summarize(&accounts, &appointments, &facility))
}

pub fn admin_activity(
    conn: &Connection,
    session: &Session,
    limit: usize,
) -> Result<Vec<ActivityEvent>, CareError> {
    let facility = session.require_admin()?;
    let (accounts, appointments) = load_facility(conn, &facility)?;
    let transactions = db::list_transactions(conn, Some(&facility))?;
    Ok(recent_activity(
        &accounts,
        &appointments,
        &transactions,
        &facility,
        limit.min(MAX_ACTIVITY_LIMIT),
    ))
}

/// Overview of one patient's appointments, for the patient or their
/// facility administrator.
pub fn load_patient_overview(
    conn: &Connection,
    session: &Session,
    patient_id: &Uuid,
) -> Result<PatientOverview, CareError> {
    let patient = db::require_account(conn, patient_id)?;
    require_account_access(session, &patient)?;
    let appointments = db::list_patient_appointments(conn, patient_id)?;
    Ok(patient_overview(&appointments))
}
