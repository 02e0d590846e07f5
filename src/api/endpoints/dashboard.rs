use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::types::ApiContext;
use crate::db::repository::dashboard::{self, DashboardStats};

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn stats(
    State(ctx): State<ApiContext>,
    Query(q): Query<StatsQuery>,
) -> ApiResult<Json<DashboardStats>> {
    let conn = ctx.db.get();
    Ok(Json(dashboard::stats(
        &conn,
        q.from.as_deref(),
        q.to.as_deref(),
    )?))
}
