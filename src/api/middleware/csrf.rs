//! Double-submit CSRF check for mutating requests.
//!
//! The `csrf` cookie is readable by the frontend, which mirrors it into
//! the `X-CSRF-Token` header. Safe methods pass through; anything else
//! must carry a header matching the cookie (constant-time compare).

use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::auth::cookies::CSRF_COOKIE;

pub const CSRF_HEADER: &str = "x-csrf-token";

pub async fn csrf_protect(jar: CookieJar, req: Request, next: Next) -> Result<Response, ApiError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match (cookie, header) {
        (Some(cookie), Some(header))
            if bool::from(cookie.as_bytes().ct_eq(header.as_bytes())) =>
        {
            Ok(next.run(req).await)
        }
        _ => Err(ApiError::CsrfMismatch),
    }
}
