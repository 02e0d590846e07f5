use serde::Serialize;

use super::enums::Gender;

/// A patient row as returned by every patient endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: i64,
    pub patient_code: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub dob: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_info: Option<String>,
    pub active: bool,
    pub last_visit_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Compact `{id, label}` entry for dropdowns.
#[derive(Debug, Clone, Serialize)]
pub struct PatientLookup {
    pub id: i64,
    pub label: String,
}
