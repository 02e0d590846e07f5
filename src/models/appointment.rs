use serde::Serialize;

use super::enums::{ApptStatus, ApptType};

/// An appointment row with joined patient display fields.
///
/// `start_time` is always the canonical `YYYY-MM-DD HH:MM:SS` form;
/// `patient_email`/`patient_phone` are populated only by the creation
/// reselect (the side-effect chains need them) and omitted from list
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub appt_code: Option<String>,
    pub patient_id: i64,
    pub start_time: String,
    pub duration_min: i64,
    #[serde(rename = "type")]
    pub appt_type: ApptType,
    pub status: ApptStatus,
    pub fee: f64,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub patient_name: String,
    pub patient_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_phone: Option<String>,
}

/// An appointment with an outstanding balance. `due` is recomputed on
/// every read as fee minus the sum of its paid payments, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct UnpaidAppointment {
    pub id: i64,
    pub appt_code: Option<String>,
    pub start_time: String,
    pub duration_min: i64,
    #[serde(rename = "type")]
    pub appt_type: ApptType,
    pub status: ApptStatus,
    pub fee: f64,
    pub notes: Option<String>,
    pub patient_code: Option<String>,
    pub patient_name: String,
    pub paid_amount: f64,
    pub due: f64,
}
