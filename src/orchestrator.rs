//! Best-effort side effects for the creation endpoints.
//!
//! After an appointment or payment row commits, the caller runs the
//! matching chain here. Nothing in a chain can fail the HTTP request:
//! every step is logged on failure and reported back through the
//! `SideEffects` flags the response carries.

use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::invoicing::{InvoiceClient, InvoiceError};
use crate::mailer::Mailer;
use crate::models::appointment::Appointment;
use crate::models::payment::Payment;

/// Outcome flags appended to creation responses.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SideEffects {
    pub invoice_sent: bool,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_url: Option<String>,
}

/// Days from now until the day after the appointment, floored at 1.
/// Past appointments still get an invoice due tomorrow.
fn days_until_due(start_time: &str) -> i64 {
    let Ok(start) = NaiveDateTime::parse_from_str(start_time, "%Y-%m-%d %H:%M:%S") else {
        return 1;
    };
    let due = start + Duration::days(1);
    let remaining = due - Utc::now().naive_utc();
    let days = (remaining.num_seconds() as f64 / 86_400.0).ceil() as i64;
    days.max(1)
}

async fn issue_invoice(
    client: &InvoiceClient,
    appt: &Appointment,
    email: &str,
) -> Result<Option<String>, InvoiceError> {
    let customer = client
        .find_or_create_customer(
            email,
            &appt.patient_name,
            appt.patient_phone.as_deref(),
            appt.patient_code.as_deref(),
            appt.id,
        )
        .await?;

    let description = format!(
        "{} appointment on {}",
        appt.appt_type.as_str(),
        appt.start_time
    );
    let draft = client
        .create_draft_invoice(
            &customer.id,
            days_until_due(&appt.start_time),
            &description,
            appt.id,
            appt.patient_code.as_deref(),
        )
        .await?;
    let draft_id = draft.id.ok_or(InvoiceError::MissingInvoiceId)?;

    client
        .add_line_item(
            &customer.id,
            &draft_id,
            appt.fee,
            &client.default_currency,
            &description,
        )
        .await?;

    let finalized = client.finalize_invoice(&draft_id).await?;
    let final_id = finalized.id.ok_or(InvoiceError::MissingInvoiceId)?;
    if client.auto_email {
        client.send_invoice(&final_id).await?;
    }
    Ok(finalized.hosted_invoice_url)
}

/// Invoice then confirmation email for a freshly created appointment.
/// Both legs are skipped when the patient has no email on file.
pub async fn run_appointment_chain(
    invoicing: Option<&InvoiceClient>,
    mailer: Option<&Mailer>,
    appt: &Appointment,
) -> SideEffects {
    let mut effects = SideEffects::default();
    let Some(email) = appt.patient_email.as_deref() else {
        return effects;
    };

    if let Some(client) = invoicing {
        match issue_invoice(client, appt, email).await {
            Ok(url) => {
                effects.invoice_sent = true;
                effects.invoice_url = url;
            }
            Err(err) => {
                warn!(appointment_id = appt.id, error = %err, "invoice chain failed");
            }
        }
    }

    if let Some(mailer) = mailer {
        match mailer
            .send_appointment_confirmation(appt, email, effects.invoice_url.as_deref())
            .await
        {
            Ok(()) => effects.email_sent = true,
            Err(err) => {
                warn!(appointment_id = appt.id, error = %err, "confirmation email failed");
            }
        }
    }

    effects
}

/// Receipt email for a freshly recorded payment.
pub async fn run_payment_chain(mailer: Option<&Mailer>, payment: &Payment) -> SideEffects {
    let mut effects = SideEffects::default();
    let (Some(mailer), Some(email)) = (mailer, payment.patient_email.as_deref()) else {
        return effects;
    };

    match mailer.send_payment_receipt(payment, email).await {
        Ok(()) => effects.email_sent = true,
        Err(err) => {
            warn!(payment_id = payment.id, error = %err, "receipt email failed");
        }
    }
    effects
}
