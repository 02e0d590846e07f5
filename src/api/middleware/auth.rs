//! Access-token guard for the protected route tree.
//!
//! Accepts a `Bearer` Authorization header or the `at` cookie, in that
//! order. On success the resolved [`AuthUser`] is attached as a request
//! extension for handlers.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::auth::cookies::AT_COOKIE;
use crate::auth::{verify_token, TokenKind};

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

pub async fn require_auth(
    State(ctx): State<ApiContext>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)
        .or_else(|| jar.get(AT_COOKIE).map(|c| c.value().to_string()))
        .ok_or(ApiError::Unauthorized)?;

    let user_id = verify_token(&token, TokenKind::Access, &ctx.config.access_secret)
        .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(AuthUser { id: user_id });
    Ok(next.run(req).await)
}
