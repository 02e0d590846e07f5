//! Session cookie issue/clear helpers.
//!
//! Three cookies make a session: `at` (access token, HttpOnly, site
//! wide), `rt` (refresh token, HttpOnly, scoped to the refresh path
//! only) and `csrf` (readable, mirrored into a request header by the
//! frontend). Clearing must use the exact attributes and paths used at
//! set time or browsers silently keep the cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::config::Config;

use super::token::{generate_csrf_token, sign_token, TokenKind};

pub const AT_COOKIE: &str = "at";
pub const RT_COOKIE: &str = "rt";
pub const CSRF_COOKIE: &str = "csrf";

/// Path scope for the refresh-token cookie.
pub const REFRESH_PATH: &str = "/api/auth";

fn same_site(config: &Config) -> SameSite {
    // Cross-origin frontend in production needs None (+ Secure).
    if config.is_prod {
        SameSite::None
    } else {
        SameSite::Lax
    }
}

/// Issue all three session cookies for `user_id`, rotating any that
/// already exist on the jar.
pub fn issue_session_cookies(jar: CookieJar, user_id: i64, config: &Config) -> CookieJar {
    let access = sign_token(
        user_id,
        TokenKind::Access,
        config.access_ttl_mins * 60,
        &config.access_secret,
    );
    let refresh = sign_token(
        user_id,
        TokenKind::Refresh,
        config.refresh_ttl_days * 24 * 60 * 60,
        &config.refresh_secret,
    );
    let csrf = generate_csrf_token();

    let at = Cookie::build((AT_COOKIE, access))
        .http_only(true)
        .secure(config.is_prod)
        .same_site(same_site(config))
        .max_age(Duration::minutes(config.access_ttl_mins))
        .path("/")
        .build();

    let rt = Cookie::build((RT_COOKIE, refresh))
        .http_only(true)
        .secure(config.is_prod)
        .same_site(same_site(config))
        .max_age(Duration::days(config.refresh_ttl_days))
        .path(REFRESH_PATH)
        .build();

    let cs = Cookie::build((CSRF_COOKIE, csrf))
        .http_only(false)
        .secure(config.is_prod)
        .same_site(same_site(config))
        .max_age(Duration::days(config.refresh_ttl_days))
        .path("/")
        .build();

    jar.add(at).add(rt).add(cs)
}

/// Clear all three session cookies with matching attributes/paths.
pub fn clear_session_cookies(jar: CookieJar, config: &Config) -> CookieJar {
    let expire = |name: &'static str, http_only: bool, path: &'static str| {
        Cookie::build((name, ""))
            .http_only(http_only)
            .secure(config.is_prod)
            .same_site(same_site(config))
            .max_age(Duration::ZERO)
            .path(path)
            .build()
    };

    jar.add(expire(AT_COOKIE, true, "/"))
        .add(expire(CSRF_COOKIE, false, "/"))
        .add(expire(RT_COOKIE, true, REFRESH_PATH))
}
