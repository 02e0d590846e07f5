//! Patient CRUD plus the paged listing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::ApiContext;
use crate::db::repository::patient::{self, PatientInput};
use crate::db::with_tx;
use crate::models::enums::Gender;
use crate::models::patient::Patient;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default, alias = "q")]
    pub query: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Body for create and partial update; camelCase aliases keep older
/// frontend payloads working.
#[derive(Debug, Default, Deserialize)]
pub struct PatientBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    #[serde(alias = "dateOfBirth")]
    pub dob: Option<String>,
    #[serde(alias = "bloodType")]
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    #[serde(alias = "medicalInfo")]
    pub medical_info: Option<String>,
    pub active: Option<bool>,
}

impl PatientBody {
    fn into_input(self) -> PatientInput {
        PatientInput {
            name: self.name.map(|n| n.trim().to_string()),
            email: self.email,
            phone: self.phone,
            gender: self.gender,
            dob: self.dob,
            blood_type: self.blood_type,
            allergies: self.allergies,
            medical_info: self.medical_info,
            active: self.active,
        }
    }
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(20).clamp(1, 100);

    let conn = ctx.db.get();
    let (data, total) = patient::list(&conn, q.query.as_deref().unwrap_or(""), page, limit)?;
    Ok(Json(json!({
        "data": data,
        "page": page,
        "limit": limit,
        "total": total,
    })))
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Patient>> {
    let conn = ctx.db.get();
    let found = patient::get(&conn, id)?;
    found
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id}")))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<PatientBody>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    if body.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }

    let input = body.into_input();
    let id = with_tx(&ctx.db, |tx| patient::insert(tx, &input))?;

    let conn = ctx.db.get();
    let created = patient::get(&conn, id)?
        .ok_or_else(|| ApiError::Internal("created patient vanished".to_string()))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<PatientBody>,
) -> ApiResult<Json<Patient>> {
    let input = body.into_input();
    let conn = ctx.db.get();
    if patient::update(&conn, id, &input)? == 0 {
        return Err(ApiError::NotFound(format!("Patient {id}")));
    }
    let refreshed = patient::get(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id}")))?;
    Ok(Json(refreshed))
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if patient::delete(&conn, id)? == 0 {
        return Err(ApiError::NotFound(format!("Patient {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
