//! Session endpoints: login, refresh, logout.
//!
//! Tokens never appear in response bodies; they travel only in the
//! HttpOnly cookies set here.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::ApiContext;
use crate::auth::cookies::{clear_session_cookies, issue_session_cookies, RT_COOKIE};
use crate::auth::password::verify_password;
use crate::auth::{verify_token, TokenKind};
use crate::db::repository::user;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(ctx): State<ApiContext>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let found = {
        let conn = ctx.db.get();
        user::find_by_email(&conn, body.email.trim())?
    };

    // Same failure for unknown email and bad password.
    let (public, hash) = found.ok_or(ApiError::Unauthorized)?;
    if !verify_password(&body.password, &hash) {
        return Err(ApiError::Unauthorized);
    }

    info!(user_id = public.id, "login");
    let jar = issue_session_cookies(jar, public.id, &ctx.config);
    Ok((jar, Json(json!({ "user": public }))))
}

/// Rotate the whole cookie set off a valid refresh token.
pub async fn refresh(
    State(ctx): State<ApiContext>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let token = jar
        .get(RT_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized)?;
    let user_id = verify_token(&token, TokenKind::Refresh, &ctx.config.refresh_secret)
        .map_err(|_| ApiError::Unauthorized)?;

    let public = {
        let conn = ctx.db.get();
        user::get_public(&conn, user_id)?
    }
    .ok_or(ApiError::Unauthorized)?;

    let jar = issue_session_cookies(jar, user_id, &ctx.config);
    Ok((jar, Json(json!({ "user": public }))))
}

pub async fn logout(
    State(ctx): State<ApiContext>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    let jar = clear_session_cookies(jar, &ctx.config);
    (jar, Json(json!({ "ok": true })))
}
