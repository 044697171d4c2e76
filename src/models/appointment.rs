use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, AppointmentType, PaymentStatus};

/// One scheduled encounter between a patient and their facility.
///
/// `patient_name`, `patient_email` and `patient_image` are copied from the
/// patient's account at booking time and never refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: AppointmentType,
    pub date: NaiveDate,
    /// HH:MM, 24-hour.
    pub time: String,
    pub message: String,
    pub doctor_note: Option<String>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Naira owed. Set by an administrator; zero until then.
    pub amount: i64,
    pub doctor_name: Option<String>,
    pub meeting_link: Option<String>,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub appointment_type: AppointmentType,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub appointment_type: AppointmentType,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default)]
    pub message: String,
    pub expected_version: Option<i64>,
}

/// Administrator edit. Absent fields are left untouched; an empty
/// `meeting_link` clears the link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub amount: Option<i64>,
    pub doctor_name: Option<String>,
    pub doctor_note: Option<String>,
    pub meeting_link: Option<String>,
    pub expected_version: Option<i64>,
}

/// Appointment row joined with the owning account's current email, for
/// administrative dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub owner_email: String,
}
