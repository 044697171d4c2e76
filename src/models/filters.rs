use uuid::Uuid;

use super::enums::Role;

#[derive(Debug, Default, Clone)]
pub struct AccountFilter {
    pub facility_id: Option<Uuid>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub facility_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}
