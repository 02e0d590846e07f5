//! Invoice-provider client (Stripe-style REST API over `reqwest`).
//!
//! Drives the provider's form-encoded endpoints directly: customer
//! find-or-create, draft invoice, line items, finalize, send. Amounts
//! are converted to minor units; zero-decimal currencies pass through
//! unscaled. The base URL is injectable so tests never hit the real
//! provider.

use std::collections::HashSet;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::config::InvoicingConfig;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("finalized invoice has no id")]
    MissingInvoiceId,
}

/// Currencies whose minor unit equals the major unit.
fn zero_decimal() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx",
            "vnd", "vuv", "xaf", "xof", "xpf",
        ]
        .into_iter()
        .collect()
    })
}

/// Convert a major-unit amount to the provider's minor units.
pub fn to_minor(amount: f64, currency: &str) -> i64 {
    if zero_decimal().contains(currency.to_lowercase().as_str()) {
        amount.round() as i64
    } else {
        (amount * 100.0).round() as i64
    }
}

#[derive(Debug, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
pub struct Invoice {
    pub id: Option<String>,
    pub status: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

pub struct InvoiceClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
    pub default_currency: String,
    pub auto_email: bool,
}

impl InvoiceClient {
    pub fn new(config: &InvoicingConfig) -> Self {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(config: &InvoicingConfig, base_url: &str) -> Self {
        InvoiceClient {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_currency: config.default_currency.clone(),
            auto_email: config.auto_email,
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<reqwest::Response, InvoiceError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        check_status(resp).await
    }

    /// Find a customer by email, creating one if none exists.
    pub async fn find_or_create_customer(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
        patient_code: Option<&str>,
        appointment_id: i64,
    ) -> Result<Customer, InvoiceError> {
        let resp = self
            .http
            .get(format!("{}/customers", self.base_url))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let list: CustomerList = check_status(resp).await?.json().await?;
        if let Some(existing) = list.data.into_iter().next() {
            return Ok(existing);
        }

        let mut form = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
            (
                "metadata[appointment_id]".to_string(),
                appointment_id.to_string(),
            ),
        ];
        if let Some(phone) = phone {
            form.push(("phone".to_string(), phone.to_string()));
        }
        if let Some(code) = patient_code {
            form.push(("metadata[patient_code]".to_string(), code.to_string()));
        }

        Ok(self.post_form("/customers", &form).await?.json().await?)
    }

    /// Create a draft invoice (send_invoice collection, explicit
    /// finalization).
    pub async fn create_draft_invoice(
        &self,
        customer_id: &str,
        days_until_due: i64,
        description: &str,
        appointment_id: i64,
        patient_code: Option<&str>,
    ) -> Result<Invoice, InvoiceError> {
        let mut form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("collection_method".to_string(), "send_invoice".to_string()),
            ("days_until_due".to_string(), days_until_due.to_string()),
            ("auto_advance".to_string(), "false".to_string()),
            ("description".to_string(), description.to_string()),
            ("currency".to_string(), self.default_currency.clone()),
            (
                "metadata[appointment_id]".to_string(),
                appointment_id.to_string(),
            ),
        ];
        if let Some(code) = patient_code {
            form.push(("metadata[patient_code]".to_string(), code.to_string()));
        }

        Ok(self.post_form("/invoices", &form).await?.json().await?)
    }

    /// Attach an ad-hoc line item to a draft invoice.
    pub async fn add_line_item(
        &self,
        customer_id: &str,
        invoice_id: &str,
        amount: f64,
        currency: &str,
        description: &str,
    ) -> Result<(), InvoiceError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("invoice".to_string(), invoice_id.to_string()),
            ("amount".to_string(), to_minor(amount, currency).to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("description".to_string(), description.to_string()),
        ];
        self.post_form("/invoiceitems", &form).await?;
        Ok(())
    }

    /// Finalize a draft (status becomes `open`).
    pub async fn finalize_invoice(&self, invoice_id: &str) -> Result<Invoice, InvoiceError> {
        Ok(self
            .post_form(&format!("/invoices/{invoice_id}/finalize"), &[])
            .await?
            .json()
            .await?)
    }

    /// Ask the provider to email the finalized invoice itself.
    pub async fn send_invoice(&self, invoice_id: &str) -> Result<(), InvoiceError> {
        self.post_form(&format!("/invoices/{invoice_id}/send"), &[])
            .await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, InvoiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(InvoiceError::Api {
        status: status.as_u16(),
        body,
    })
}
