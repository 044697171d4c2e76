use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_date, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "a.id, a.patient_id, a.appointment_type, a.date, a.time,
     a.message, a.doctor_note, a.status, a.payment_status, a.amount, a.doctor_name,
     a.meeting_link, a.patient_name, a.patient_email, a.patient_image, a.created_at,
     a.updated_at, a.version";

struct AppointmentRow {
    id: String,
    patient_id: String,
    appointment_type: String,
    date: String,
    time: String,
    message: String,
    doctor_note: Option<String>,
    status: String,
    payment_status: String,
    amount: i64,
    doctor_name: Option<String>,
    meeting_link: Option<String>,
    patient_name: String,
    patient_email: String,
    patient_image: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

fn read_appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        appointment_type: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        message: row.get(5)?,
        doctor_note: row.get(6)?,
        status: row.get(7)?,
        payment_status: row.get(8)?,
        amount: row.get(9)?,
        doctor_name: row.get(10)?,
        meeting_link: row.get(11)?,
        patient_name: row.get(12)?,
        patient_email: row.get(13)?,
        patient_image: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        version: row.get(17)?,
    })
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DatabaseError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: parse_uuid(&row.id)?,
            patient_id: parse_uuid(&row.patient_id)?,
            appointment_type: AppointmentType::from_str(&row.appointment_type)?,
            date: parse_date(&row.date)?,
            time: row.time,
            message: row.message,
            doctor_note: row.doctor_note,
            status: AppointmentStatus::from_str(&row.status)?,
            payment_status: PaymentStatus::from_str(&row.payment_status)?,
            amount: row.amount,
            doctor_name: row.doctor_name,
            meeting_link: row.meeting_link,
            patient_name: row.patient_name,
            patient_email: row.patient_email,
            patient_image: row.patient_image,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            version: row.version,
        })
    }
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, appointment_type, date, time, message,
         doctor_note, status, payment_status, amount, doctor_name, meeting_link,
         patient_name, patient_email, patient_image, created_at, updated_at, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.appointment_type.as_str(),
            appt.date.to_string(),
            appt.time,
            appt.message,
            appt.doctor_note,
            appt.status.as_str(),
            appt.payment_status.as_str(),
            appt.amount,
            appt.doctor_name,
            appt.meeting_link,
            appt.patient_name,
            appt.patient_email,
            appt.patient_image,
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
            appt.version,
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1"),
            params![id.to_string()],
            read_appointment_row,
        )
        .optional()?;
    row.map(Appointment::try_from).transpose()
}

/// Fetch an appointment only if it belongs to `patient_id`.
pub fn get_patient_appointment(
    conn: &Connection,
    patient_id: &Uuid,
    id: &Uuid,
) -> Result<Appointment, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
                 WHERE a.id = ?1 AND a.patient_id = ?2"
            ),
            params![id.to_string(), patient_id.to_string()],
            read_appointment_row,
        )
        .optional()?;
    match row {
        Some(row) => Appointment::try_from(row),
        None => Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        }),
    }
}

/// A patient's appointments in booking order.
pub fn list_patient_appointments(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments a
         WHERE a.patient_id = ?1 ORDER BY a.rowid ASC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], read_appointment_row)?;
    rows.map(|r| Appointment::try_from(r?)).collect()
}

/// Appointments across patients, joined with each owner's current email,
/// newest first.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> Result<Vec<FacilityAppointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}, p.email FROM appointments a
         JOIN accounts p ON p.id = a.patient_id
         WHERE (?1 IS NULL OR p.facility_id = ?1)
           AND (?2 IS NULL OR a.patient_id = ?2)
         ORDER BY a.created_at DESC, a.rowid DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.facility_id.map(|id| id.to_string()),
            filter.patient_id.map(|id| id.to_string()),
        ],
        |row| Ok((read_appointment_row(row)?, row.get::<_, String>(18)?)),
    )?;

    let mut appointments = Vec::new();
    for row in rows {
        let (raw, owner_email) = row?;
        appointments.push(FacilityAppointment {
            appointment: Appointment::try_from(raw)?,
            owner_email,
        });
    }
    Ok(appointments)
}

/// Conditional write of every mutable column. Bumps `version` and returns it.
pub fn update_appointment(
    conn: &Connection,
    appt: &Appointment,
    expected_version: i64,
) -> Result<i64, DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET appointment_type = ?1, date = ?2, time = ?3, message = ?4,
         doctor_note = ?5, status = ?6, payment_status = ?7, amount = ?8, doctor_name = ?9,
         meeting_link = ?10, updated_at = ?11, version = version + 1
         WHERE id = ?12 AND version = ?13",
        params![
            appt.appointment_type.as_str(),
            appt.date.to_string(),
            appt.time,
            appt.message,
            appt.doctor_note,
            appt.status.as_str(),
            appt.payment_status.as_str(),
            appt.amount,
            appt.doctor_name,
            appt.meeting_link,
            format_timestamp(&appt.updated_at),
            appt.id.to_string(),
            expected_version,
        ],
    )?;
    if updated == 0 {
        let found = get_appointment(conn, &appt.id)?
            .ok_or_else(|| DatabaseError::NotFound {
                entity_type: "Appointment".into(),
                id: appt.id.to_string(),
            })?
            .version;
        return Err(DatabaseError::VersionMismatch {
            entity_type: "Appointment".into(),
            id: appt.id.to_string(),
            expected: expected_version,
            found,
        });
    }
    Ok(expected_version + 1)
}

/// Hard-delete one appointment owned by `patient_id`.
pub fn delete_appointment(
    conn: &Connection,
    patient_id: &Uuid,
    id: &Uuid,
) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM appointments WHERE id = ?1 AND patient_id = ?2",
        params![id.to_string(), patient_id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
