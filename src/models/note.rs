use serde::Serialize;

/// A free-text note attached to a patient.
#[derive(Debug, Clone, Serialize)]
pub struct PatientNote {
    pub id: i64,
    pub patient_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub author_user_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}
