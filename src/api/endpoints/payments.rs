//! Payment endpoints: CRUD, refund, CSV export and the receipt email
//! chain on creation.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::endpoints::appointments::with_effects;
use crate::api::error::{ApiError, ApiResult};
use crate::api::types::ApiContext;
use crate::csvout::to_csv;
use crate::db::repository::{
    appointment,
    payment::{self, NewPayment, PaymentChanges, PaymentFilters},
};
use crate::db::with_tx;
use crate::models::enums::{PayMethod, PayStatus};
use crate::models::payment::Payment;
use crate::orchestrator::run_payment_chain;
use crate::resolve::{resolve_patient_id, IdOrCode, PatientRef};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "q")]
    pub search: Option<String>,
    pub method: Option<PayMethod>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
    pub patient_id: Option<IdOrCode>,
    pub patient_code: Option<String>,
    pub appointment_id: Option<i64>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub method: Option<PayMethod>,
    pub status: Option<PayStatus>,
    pub description: Option<String>,
    pub transaction_ref: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
    pub patient_id: Option<IdOrCode>,
    pub patient_code: Option<String>,
    pub appointment_id: Option<i64>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub method: Option<PayMethod>,
    pub status: Option<PayStatus>,
    pub description: Option<String>,
    pub transaction_ref: Option<String>,
    pub last4: Option<String>,
}

fn check_amount(amount: f64) -> ApiResult<()> {
    if amount < 0.0 {
        return Err(ApiError::BadRequest("amount must be non-negative".to_string()));
    }
    Ok(())
}

fn check_currency(currency: &str) -> ApiResult<()> {
    if currency.chars().count() != 3 {
        return Err(ApiError::BadRequest(
            "currency must be a 3-letter code".to_string(),
        ));
    }
    Ok(())
}

fn check_last4(last4: &str) -> ApiResult<()> {
    if last4.chars().count() != 4 {
        return Err(ApiError::BadRequest(
            "last4 must be exactly 4 characters".to_string(),
        ));
    }
    Ok(())
}

fn filters(q: &ListQuery) -> PaymentFilters<'_> {
    PaymentFilters {
        search: q.search.as_deref(),
        method: q.method,
        from: q.from.as_deref(),
        to: q.to.as_deref(),
    }
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Payment>>> {
    let conn = ctx.db.get();
    Ok(Json(payment::list(&conn, &filters(&q))?))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Payment>> {
    let conn = ctx.db.get();
    payment::get(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Payment {id}")))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let amount = body
        .amount
        .ok_or_else(|| ApiError::BadRequest("amount is required".to_string()))?;
    check_amount(amount)?;
    let method = body
        .method
        .ok_or_else(|| ApiError::BadRequest("method is required".to_string()))?;
    let status = body
        .status
        .ok_or_else(|| ApiError::BadRequest("status is required".to_string()))?;
    let currency = body.currency.unwrap_or_else(|| "USD".to_string());
    check_currency(&currency)?;
    if let Some(last4) = body.last4.as_deref() {
        check_last4(last4)?;
    }

    let patient_ref =
        PatientRef::from_parts(body.patient_id.as_ref(), body.patient_code.as_deref());
    let patient_id = {
        let conn = ctx.db.get();
        resolve_patient_id(&conn, &patient_ref)?
    };

    if let Some(appt_id) = body.appointment_id {
        let conn = ctx.db.get();
        if appointment::get(&conn, appt_id)?.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown appointment {appt_id}")));
        }
    }

    let new = NewPayment {
        patient_id,
        appointment_id: body.appointment_id,
        amount,
        currency,
        method,
        status,
        description: body.description,
        transaction_ref: body.transaction_ref,
        last4: body.last4,
    };
    let id = with_tx(&ctx.db, |tx| payment::insert(tx, &new))?;

    let mut created = {
        let conn = ctx.db.get();
        payment::get_with_contact(&conn, id)?
            .ok_or_else(|| ApiError::Internal("created payment vanished".to_string()))?
    };

    let effects = run_payment_chain(ctx.mailer.as_deref(), &created).await;
    created.patient_email = None;
    Ok((StatusCode::CREATED, with_effects(&created, &effects)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<Payment>> {
    if let Some(amount) = body.amount {
        check_amount(amount)?;
    }
    if let Some(currency) = body.currency.as_deref() {
        check_currency(currency)?;
    }
    if let Some(last4) = body.last4.as_deref() {
        check_last4(last4)?;
    }

    let mut changes = PaymentChanges {
        appointment_id: body.appointment_id,
        amount: body.amount,
        currency: body.currency,
        method: body.method,
        status: body.status,
        description: body.description,
        transaction_ref: body.transaction_ref,
        last4: body.last4,
        ..Default::default()
    };

    if body.patient_id.is_some() || body.patient_code.is_some() {
        let patient_ref =
            PatientRef::from_parts(body.patient_id.as_ref(), body.patient_code.as_deref());
        let conn = ctx.db.get();
        changes.patient_id = Some(resolve_patient_id(&conn, &patient_ref)?);
    }

    let conn = ctx.db.get();
    if payment::update(&conn, id, &changes)? == 0 {
        return Err(ApiError::NotFound(format!("Payment {id}")));
    }
    let refreshed = payment::get(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Payment {id}")))?;
    Ok(Json(refreshed))
}

pub async fn refund(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if payment::mark_refunded(&conn, id)? == 0 {
        return Err(ApiError::NotFound(format!("Payment {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if payment::delete(&conn, id)? == 0 {
        return Err(ApiError::NotFound(format!("Payment {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

const EXPORT_HEADERS: [&str; 10] = [
    "Payment Code",
    "Patient",
    "Patient Code",
    "Appointment Code",
    "Date",
    "Amount",
    "Currency",
    "Method",
    "Status",
    "Description",
];

/// Uncapped CSV download, same filters as the listing.
pub async fn export(
    State(ctx): State<ApiContext>,
    Query(q): Query<ListQuery>,
) -> ApiResult<(HeaderMap, String)> {
    let rows = {
        let conn = ctx.db.get();
        payment::list_for_export(&conn, &filters(&q))?
    };

    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|p| {
            vec![
                p.payment_code.clone().unwrap_or_default(),
                p.patient_name.clone(),
                p.patient_code.clone().unwrap_or_default(),
                p.appt_code.clone().unwrap_or_default(),
                p.created_at.clone(),
                format!("{:.2}", p.amount),
                p.currency.clone(),
                p.method.as_str().to_string(),
                p.status.as_str().to_string(),
                p.description.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"payments.csv\""),
    );
    Ok((headers, to_csv(&EXPORT_HEADERS, &records)))
}
