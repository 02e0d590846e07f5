//! Clinical notes, nested under a patient and always scoped to it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{ApiContext, AuthUser};
use crate::db::repository::{note, patient};
use crate::models::note::PatientNote;

#[derive(Debug, Default, Deserialize)]
pub struct NoteBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

fn ensure_patient(ctx: &ApiContext, patient_id: i64) -> ApiResult<()> {
    let conn = ctx.db.get();
    if patient::get(&conn, patient_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Patient {patient_id}")));
    }
    Ok(())
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<i64>,
) -> ApiResult<Json<Vec<PatientNote>>> {
    ensure_patient(&ctx, patient_id)?;
    let conn = ctx.db.get();
    Ok(Json(note::list_for_patient(&conn, patient_id)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(patient_id): Path<i64>,
    Json(body): Json<NoteBody>,
) -> ApiResult<(StatusCode, Json<PatientNote>)> {
    let title = body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("title is required".to_string()))?;
    ensure_patient(&ctx, patient_id)?;

    let conn = ctx.db.get();
    let id = note::insert(&conn, patient_id, title, body.content.as_deref(), Some(user.id))?;
    let created = note::get(&conn, id, patient_id)?
        .ok_or_else(|| ApiError::Internal("created note vanished".to_string()))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path((patient_id, note_id)): Path<(i64, i64)>,
    Json(body): Json<NoteBody>,
) -> ApiResult<Json<PatientNote>> {
    let conn = ctx.db.get();
    let title = body.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    if note::update(&conn, note_id, patient_id, title, body.content.as_deref(), Some(user.id))? == 0
    {
        return Err(ApiError::NotFound(format!("Note {note_id}")));
    }
    let refreshed = note::get(&conn, note_id, patient_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Note {note_id}")))?;
    Ok(Json(refreshed))
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Path((patient_id, note_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let conn = ctx.db.get();
    if note::delete(&conn, note_id, patient_id)? == 0 {
        return Err(ApiError::NotFound(format!("Note {note_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
