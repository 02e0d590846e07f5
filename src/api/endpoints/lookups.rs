//! Lightweight dropdown data.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::types::ApiContext;
use crate::db::repository::patient;
use crate::models::patient::PatientLookup;

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    #[serde(default, alias = "query")]
    pub q: Option<String>,
}

pub async fn patients(
    State(ctx): State<ApiContext>,
    Query(q): Query<LookupQuery>,
) -> ApiResult<Json<Vec<PatientLookup>>> {
    let conn = ctx.db.get();
    Ok(Json(patient::lookup(&conn, q.q.as_deref().unwrap_or(""))?))
}
