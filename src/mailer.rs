//! Outbound clinic email over async SMTP.
//!
//! Two message kinds: an appointment confirmation (calendar invite
//! attached, optional payment link with an inline QR code) and a
//! payment receipt. Sending is always best-effort at the call site; a
//! failure here never fails the request that triggered it.

use std::io::Cursor;

use chrono::{Duration, NaiveDateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::appointment::Appointment;
use crate::models::payment::Payment;

const STORED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ICS_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("unparseable appointment time: {0}")]
    BadStartTime(#[from] chrono::ParseError),
    #[error("qr encoding failed: {0}")]
    Qr(String),
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    clinic_name: String,
    clinic_tz: String,
    org_domain: String,
}

impl Mailer {
    pub fn new(
        smtp: &SmtpConfig,
        clinic_name: &str,
        clinic_tz: &str,
        org_domain: &str,
    ) -> Result<Self, MailError> {
        let builder = if smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
        };
        let mut builder = builder.port(smtp.port);
        if !smtp.user.is_empty() {
            builder = builder.credentials(Credentials::new(smtp.user.clone(), smtp.pass.clone()));
        }

        Ok(Mailer {
            transport: builder.build(),
            from: smtp.from.parse()?,
            clinic_name: clinic_name.to_string(),
            clinic_tz: clinic_tz.to_string(),
            org_domain: org_domain.to_string(),
        })
    }

    /// Confirmation for a newly booked appointment. Attaches a
    /// calendar invite; when a payment link is available the HTML part
    /// carries a "Pay now" link plus an inline QR for it.
    pub async fn send_appointment_confirmation(
        &self,
        appt: &Appointment,
        to_email: &str,
        invoice_url: Option<&str>,
    ) -> Result<(), MailError> {
        let reference = appt.appt_code.clone().unwrap_or_else(|| {
            format!("APT-{:06}", appt.id)
        });
        let when = format!("{} ({})", appt.start_time, self.clinic_tz);
        let appt_type = appt.appt_type.as_str();

        let mut text = format!(
            "Hello {name},\n\n\
             Your appointment at {clinic} is confirmed.\n\n\
             When: {when}\n\
             Type: {appt_type}\n\
             Reference: #{reference}\n",
            name = appt.patient_name,
            clinic = self.clinic_name,
        );
        if let Some(notes) = &appt.notes {
            text.push_str(&format!("Notes: {notes}\n"));
        }
        if let Some(url) = invoice_url {
            text.push_str(&format!("\nPay now: {url}\n"));
        }
        text.push_str("\nA calendar invite is attached.\n");

        let mut html = format!(
            "<p>Hello {name},</p>\
             <p>Your appointment at <strong>{clinic}</strong> is confirmed.</p>\
             <table>\
             <tr><td>When</td><td>{when}</td></tr>\
             <tr><td>Type</td><td>{appt_type}</td></tr>\
             <tr><td>Reference</td><td>#{reference}</td></tr>",
            name = appt.patient_name,
            clinic = self.clinic_name,
        );
        if let Some(notes) = &appt.notes {
            html.push_str(&format!("<tr><td>Notes</td><td>{notes}</td></tr>"));
        }
        html.push_str("</table>");
        if let Some(url) = invoice_url {
            html.push_str(&format!(
                "<p><a href=\"{url}\">Pay now</a></p>\
                 <p><img src=\"cid:pay-qr\" alt=\"Payment QR\" width=\"160\"/></p>"
            ));
        }
        html.push_str("<p>A calendar invite is attached.</p>");

        let html_part = if let Some(url) = invoice_url {
            let png = payment_qr_png(url)?;
            MultiPart::related()
                .singlepart(SinglePart::html(html))
                .singlepart(
                    Attachment::new_inline("pay-qr".to_string())
                        .body(png, ContentType::parse("image/png")?),
                )
        } else {
            MultiPart::related().singlepart(SinglePart::html(html))
        };

        let ics = build_ics(appt, &self.clinic_name, &self.org_domain)?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject(format!(
                "Appointment confirmed: {} on {}",
                self.clinic_name, appt.start_time
            ))
            .multipart(
                MultiPart::mixed()
                    .multipart(
                        MultiPart::alternative()
                            .singlepart(SinglePart::plain(text))
                            .multipart(html_part),
                    )
                    .singlepart(Attachment::new("appointment.ics".to_string()).body(
                        ics,
                        ContentType::parse("text/calendar; charset=utf-8; method=PUBLISH")?,
                    )),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }

    /// Receipt for a recorded payment.
    pub async fn send_payment_receipt(
        &self,
        payment: &Payment,
        to_email: &str,
    ) -> Result<(), MailError> {
        let method = {
            let mut m = payment.method.as_str().to_uppercase();
            if let Some(last4) = &payment.last4 {
                m.push_str(&format!(" (****{last4})"));
            }
            m
        };
        let amount = format!("{:.2} {}", payment.amount, payment.currency.to_uppercase());
        let patient = match &payment.patient_code {
            Some(code) => format!("{} ({code})", payment.patient_name),
            None => payment.patient_name.clone(),
        };

        let mut rows = vec![("Amount", amount.clone()), ("Method", method)];
        if let Some(tx) = &payment.transaction_ref {
            rows.push(("Transaction ref", tx.clone()));
        }
        if let Some(appt) = &payment.appt_code {
            rows.push(("Appointment", appt.clone()));
        }
        rows.push(("Patient", patient));
        rows.push((
            "Date",
            format!("{} ({})", payment.created_at, self.clinic_tz),
        ));

        let text = format!(
            "Thank you for your payment to {}.\n\n{}\n",
            self.clinic_name,
            rows.iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let html = format!(
            "<p>Thank you for your payment to <strong>{}</strong>.</p><table>{}</table>",
            self.clinic_name,
            rows.iter()
                .map(|(k, v)| format!("<tr><td>{k}</td><td>{v}</td></tr>"))
                .collect::<String>()
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_email.parse()?)
            .subject(format!("Payment receipt: {amount}"))
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(text))
                    .singlepart(SinglePart::html(html)),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

fn ics_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Render a one-event calendar for the appointment. The stored naive
/// time is emitted as-is in UTC basic format.
pub fn build_ics(
    appt: &Appointment,
    clinic_name: &str,
    org_domain: &str,
) -> Result<String, MailError> {
    let start = NaiveDateTime::parse_from_str(&appt.start_time, STORED_TIME_FORMAT)?;
    let end = start + Duration::minutes(appt.duration_min);
    let uid = format!("{}-{}@{}", appt.id, uuid::Uuid::new_v4().simple(), org_domain);
    let summary = format!("{clinic_name} appointment");
    let description = match &appt.notes {
        Some(notes) => format!("Appointment with {}\n{}", appt.patient_name, notes),
        None => format!("Appointment with {}", appt.patient_name),
    };

    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//SquareOne//Appointments//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", Utc::now().format(ICS_TIME_FORMAT)),
        format!("DTSTART:{}", start.format(ICS_TIME_FORMAT)),
        format!("DTEND:{}", end.format(ICS_TIME_FORMAT)),
        format!("SUMMARY:{}", ics_escape(&summary)),
        format!("DESCRIPTION:{}", ics_escape(&description)),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];
    Ok(lines.join("\r\n"))
}

/// PNG-encoded QR for a payment link.
pub fn payment_qr_png(data: &str) -> Result<Vec<u8>, MailError> {
    let code = qrcode::QrCode::new(data.as_bytes()).map_err(|e| MailError::Qr(e.to_string()))?;
    let img = code.render::<image::Luma<u8>>().min_dimensions(160, 160).build();
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| MailError::Qr(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{ApptStatus, ApptType};

    fn sample_appt() -> Appointment {
        Appointment {
            id: 7,
            appt_code: Some("APT-000007".into()),
            patient_id: 1,
            start_time: "2026-03-02 09:30:00".into(),
            duration_min: 45,
            appt_type: ApptType::Consultation,
            status: ApptStatus::Scheduled,
            fee: 120.0,
            notes: Some("Bring reports; fasting\nrequired".into()),
            created_by: None,
            created_at: "2026-03-01 08:00:00".into(),
            updated_at: "2026-03-01 08:00:00".into(),
            patient_name: "Ana Perera".into(),
            patient_code: Some("P-001".into()),
            patient_email: Some("ana@example.test".into()),
            patient_phone: None,
        }
    }

    #[test]
    fn ics_has_event_window_and_escaped_description() {
        let ics = build_ics(&sample_appt(), "Test Clinic", "squareone.test").unwrap();
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20260302T093000Z"));
        assert!(ics.contains("DTEND:20260302T101500Z"));
        assert!(ics.contains("@squareone.test"));
        // Literal newlines become the \n escape, semicolons are escaped.
        assert!(ics.contains("fasting\\nrequired"));
        assert!(ics.contains("Bring reports\\;"));
        assert!(ics.ends_with("END:VCALENDAR"));
    }

    #[test]
    fn ics_rejects_malformed_start_time() {
        let mut appt = sample_appt();
        appt.start_time = "soon".into();
        assert!(build_ics(&appt, "Test Clinic", "squareone.test").is_err());
    }

    #[test]
    fn qr_png_is_nonempty_png() {
        let png = payment_qr_png("https://pay.example.test/i/abc").unwrap();
        assert!(png.len() > 8);
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }
}
