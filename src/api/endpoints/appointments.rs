//! Appointment endpoints, including the unpaid view and the creation
//! side-effect chain (invoice, confirmation email).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{ApiContext, AuthUser};
use crate::db::repository::appointment::{self, ApptChanges, ApptFilters, NewAppointment};
use crate::db::with_tx;
use crate::models::appointment::{Appointment, UnpaidAppointment};
use crate::models::enums::{ApptStatus, ApptType};
use crate::orchestrator::{run_appointment_chain, SideEffects};
use crate::resolve::{resolve_patient_id, resolve_start_time, IdOrCode, PatientRef};

/// Distinguishes "field absent" from "field set to null".
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "q")]
    pub search: Option<String>,
    pub status: Option<ApptStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnpaidQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
    pub patient_id: Option<IdOrCode>,
    pub patient_code: Option<String>,
    pub start_time: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_min: Option<i64>,
    #[serde(rename = "type")]
    pub appt_type: Option<ApptType>,
    pub status: Option<ApptStatus>,
    pub notes: Option<String>,
    pub fee: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBody {
    pub patient_id: Option<IdOrCode>,
    pub patient_code: Option<String>,
    pub start_time: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_min: Option<i64>,
    #[serde(rename = "type")]
    pub appt_type: Option<ApptType>,
    pub status: Option<ApptStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub fee: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: ApptStatus,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Appointment>>> {
    let conn = ctx.db.get();
    let rows = appointment::list(
        &conn,
        &ApptFilters {
            search: q.search.as_deref(),
            status: q.status,
            from: q.from.as_deref(),
            to: q.to.as_deref(),
        },
    )?;
    Ok(Json(rows))
}

pub async fn list_unpaid(
    State(ctx): State<ApiContext>,
    Query(q): Query<UnpaidQuery>,
) -> ApiResult<Json<Vec<UnpaidAppointment>>> {
    let conn = ctx.db.get();
    Ok(Json(appointment::list_unpaid(
        &conn,
        q.q.as_deref().unwrap_or(""),
    )?))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Appointment>> {
    let conn = ctx.db.get();
    appointment::get(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Appointment {id}")))
}

/// Merge the side-effect flags into the serialized row.
pub(crate) fn with_effects<T: serde::Serialize>(
    row: &T,
    effects: &SideEffects,
) -> ApiResult<Json<Value>> {
    let mut payload =
        serde_json::to_value(row).map_err(|e| ApiError::Internal(e.to_string()))?;
    let flags =
        serde_json::to_value(effects).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let (Value::Object(map), Value::Object(extra)) = (&mut payload, flags) {
        map.extend(extra);
    }
    Ok(Json(payload))
}

fn check_fee(fee: f64) -> ApiResult<()> {
    if fee < 0.0 {
        return Err(ApiError::BadRequest("fee must be non-negative".to_string()));
    }
    Ok(())
}

fn check_duration(duration_min: i64) -> ApiResult<()> {
    if duration_min <= 0 {
        return Err(ApiError::BadRequest(
            "duration_min must be positive".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let appt_type = body
        .appt_type
        .ok_or_else(|| ApiError::BadRequest("type is required".to_string()))?;
    let duration_min = body
        .duration_min
        .ok_or_else(|| ApiError::BadRequest("duration_min is required".to_string()))?;
    check_duration(duration_min)?;
    let fee = body.fee.unwrap_or(0.0);
    check_fee(fee)?;

    let patient_ref =
        PatientRef::from_parts(body.patient_id.as_ref(), body.patient_code.as_deref());
    let start_time = resolve_start_time(
        body.start_time.as_deref(),
        body.date.as_deref(),
        body.time.as_deref(),
    )
    .ok_or_else(|| ApiError::BadRequest("Invalid or missing start time".to_string()))?;

    let patient_id = {
        let conn = ctx.db.get();
        resolve_patient_id(&conn, &patient_ref)?
    };

    let new = NewAppointment {
        patient_id,
        start_time,
        duration_min,
        appt_type,
        status: body.status.unwrap_or(ApptStatus::Scheduled),
        notes: body.notes,
        fee,
        created_by: Some(user.id),
    };
    let id = with_tx(&ctx.db, |tx| appointment::insert(tx, &new))?;

    let mut created = {
        let conn = ctx.db.get();
        appointment::get_with_contact(&conn, id)?
            .ok_or_else(|| ApiError::Internal("created appointment vanished".to_string()))?
    };

    let effects = run_appointment_chain(
        ctx.invoicing.as_deref(),
        ctx.mailer.as_deref(),
        &created,
    )
    .await;

    // Contact fields fed the chain; they stay out of the response.
    created.patient_email = None;
    created.patient_phone = None;
    Ok((StatusCode::CREATED, with_effects(&created, &effects)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<Appointment>> {
    if let Some(fee) = body.fee {
        check_fee(fee)?;
    }
    if let Some(duration_min) = body.duration_min {
        check_duration(duration_min)?;
    }

    let mut changes = ApptChanges {
        duration_min: body.duration_min,
        appt_type: body.appt_type,
        status: body.status,
        notes: body.notes,
        fee: body.fee,
        ..Default::default()
    };

    if body.patient_id.is_some() || body.patient_code.is_some() {
        let patient_ref =
            PatientRef::from_parts(body.patient_id.as_ref(), body.patient_code.as_deref());
        let conn = ctx.db.get();
        changes.patient_id = Some(resolve_patient_id(&conn, &patient_ref)?);
    }
    if body.start_time.is_some() || body.date.is_some() || body.time.is_some() {
        let resolved = resolve_start_time(
            body.start_time.as_deref(),
            body.date.as_deref(),
            body.time.as_deref(),
        )
        .ok_or_else(|| ApiError::BadRequest("Invalid start time".to_string()))?;
        changes.start_time = Some(resolved);
    }

    let no_changes = changes.patient_id.is_none()
        && changes.start_time.is_none()
        && changes.duration_min.is_none()
        && changes.appt_type.is_none()
        && changes.status.is_none()
        && changes.notes.is_none()
        && changes.fee.is_none();
    if no_changes {
        return Err(ApiError::BadRequest("No updatable fields supplied".to_string()));
    }

    let conn = ctx.db.get();
    if appointment::update(&conn, id, &changes)? == 0 {
        return Err(ApiError::NotFound(format!("Appointment {id}")));
    }
    let refreshed = appointment::get(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Appointment {id}")))?;
    Ok(Json(refreshed))
}

pub async fn set_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if appointment::set_status(&conn, id, body.status)? == 0 {
        return Err(ApiError::NotFound(format!("Appointment {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if appointment::delete(&conn, id)? == 0 {
        return Err(ApiError::NotFound(format!("Appointment {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
