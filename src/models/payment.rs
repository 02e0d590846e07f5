use serde::Serialize;

use super::enums::{PayMethod, PayStatus};

/// A payment row with joined patient/appointment display fields.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub payment_code: Option<String>,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub amount: f64,
    pub currency: String,
    pub method: PayMethod,
    pub status: PayStatus,
    pub description: Option<String>,
    pub transaction_ref: Option<String>,
    pub last4: Option<String>,
    pub created_at: String,
    pub patient_name: String,
    pub patient_code: Option<String>,
    pub appt_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_email: Option<String>,
}
