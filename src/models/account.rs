use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// One person known to the directory: patient, doctor, or administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    /// Administrator that manages this account. `None` for administrators.
    pub facility_id: Option<Uuid>,
    /// Naira. Always equals the sum of the account's wallet transactions.
    pub wallet_balance: i64,
    pub nhis_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

/// Administrator input for a new patient or doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub id: Option<Uuid>,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub password: String,
}

/// Self-registration input. Always produces a patient.
///
/// `facility_id` names the administrator to register with; it may be
/// omitted while exactly one administrator exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub facility_id: Option<Uuid>,
}

/// An administrator provisioning another facility's administrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAdministrator {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Owner-initiated profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub expected_version: Option<i64>,
}
