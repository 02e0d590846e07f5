//! Route table and tower layer wiring.
//!
//! Auth endpoints and the health probe are public; everything under
//! the protected tree passes the access-token guard and, for mutating
//! methods, the CSRF check. Uploaded avatars are served statically.

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::endpoints::{
    appointments, auth, dashboard, health, lookups, notes, patients, payments, profile,
};
use super::middleware::auth::require_auth;
use super::middleware::csrf::csrf_protect;
use super::types::ApiContext;

pub fn build(ctx: ApiContext) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout));

    let protected = Router::new()
        .route("/api/patients", get(patients::list).post(patients::create))
        .route(
            "/api/patients/:id",
            get(patients::get).put(patients::update).delete(patients::delete),
        )
        .route(
            "/api/patients/:id/notes",
            get(notes::list).post(notes::create),
        )
        .route(
            "/api/patients/:id/notes/:note_id",
            put(notes::update).delete(notes::delete),
        )
        .route(
            "/api/appointments",
            get(appointments::list).post(appointments::create),
        )
        .route("/api/appointments/unpaid", get(appointments::list_unpaid))
        .route(
            "/api/appointments/:id",
            get(appointments::get)
                .put(appointments::update)
                .delete(appointments::delete),
        )
        .route("/api/appointments/:id/status", patch(appointments::set_status))
        .route("/api/payments", get(payments::list).post(payments::create))
        .route("/api/payments/export/csv", get(payments::export))
        .route(
            "/api/payments/:id",
            get(payments::get).put(payments::update).delete(payments::delete),
        )
        .route("/api/payments/:id/refund", patch(payments::refund))
        .route("/api/lookups/patients", get(lookups::patients))
        .route("/api/me", get(profile::get).put(profile::update))
        .route(
            "/api/me/avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(4 * 1024 * 1024)),
        )
        .route("/api/dashboard/stats", get(dashboard::stats))
        // csrf runs inside auth: an unauthenticated request is 401
        // before the csrf check is consulted.
        .layer(from_fn(csrf_protect))
        .layer(from_fn_with_state(ctx.clone(), require_auth));

    let origin = ctx
        .config
        .frontend_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173"));
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_credentials(true);

    let uploads_route = format!("/{}", ctx.config.upload_dir.trim_matches('/'));
    public
        .merge(protected)
        .nest_service(&uploads_route, ServeDir::new(&ctx.config.upload_dir))
        .layer(cors)
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::password::hash_password;
    use crate::config::Config;
    use crate::db::repository::user;
    use crate::db::DbPool;

    fn test_app() -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = DbPool::open(&tmp.path().join("test.db"), 2).unwrap();
        {
            let conn = pool.get();
            let hash = hash_password("secret123").unwrap();
            user::insert(&conn, "Dr. Silva", "dr@clinic.test", "admin", &hash).unwrap();
        }
        let ctx = ApiContext {
            db: pool,
            config: Arc::new(Config::for_tests()),
            mailer: None,
            invoicing: None,
        };
        (build(ctx), tmp)
    }

    async fn read_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Log in and return (cookie header value, csrf token).
    async fn login(app: &Router) -> (String, String) {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "email": "dr@clinic.test", "password": "secret123" })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let mut pairs = Vec::new();
        let mut csrf = String::new();
        for value in resp.headers().get_all(SET_COOKIE) {
            let cookie = value.to_str().unwrap();
            let pair = cookie.split(';').next().unwrap().to_string();
            if let Some(v) = pair.strip_prefix("csrf=") {
                csrf = v.to_string();
            }
            pairs.push(pair);
        }
        assert!(!csrf.is_empty());
        (pairs.join("; "), csrf)
    }

    fn authed(
        method: &str,
        uri: &str,
        cookies: &str,
        csrf: &str,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(COOKIE, cookies)
            .header("x-csrf-token", csrf);
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _tmp) = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn login_rejects_bad_password() {
        let (app, _tmp) = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "email": "dr@clinic.test", "password": "wrong" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_issues_three_cookies() {
        let (app, _tmp) = test_app();
        let (cookies, _) = login(&app).await;
        assert!(cookies.contains("at="));
        assert!(cookies.contains("rt="));
        assert!(cookies.contains("csrf="));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (app, _tmp) = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/patients")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mutations_require_the_csrf_header() {
        let (app, _tmp) = test_app();
        let (cookies, _) = login(&app).await;

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/patients")
                    .header(COOKIE, &cookies)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "name": "Ana" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(read_json(resp).await["error"]["code"], "CSRF_MISMATCH");
    }

    #[tokio::test]
    async fn patient_create_and_list_flow() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/patients",
                &cookies,
                &csrf,
                Some(json!({ "name": "Ana Perez", "email": "ana@example.test" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = read_json(resp).await;
        assert_eq!(created["name"], "Ana Perez");
        assert!(created["patient_code"].as_str().unwrap().starts_with("P-"));

        let resp = app
            .oneshot(authed("GET", "/api/patients", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let listing = read_json(resp).await;
        assert_eq!(listing["total"], 1);
        assert_eq!(listing["page"], 1);
        assert_eq!(listing["data"][0]["name"], "Ana Perez");
    }

    #[tokio::test]
    async fn appointment_create_resolves_code_and_reports_effects() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/patients",
                &cookies,
                &csrf,
                Some(json!({ "name": "Ana", "email": "ana@example.test" })),
            ))
            .await
            .unwrap();
        let code = read_json(resp).await["patient_code"]
            .as_str()
            .unwrap()
            .to_string();

        // Code arrives in the id field, time as a date + HH:MM pair.
        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": code,
                    "date": "2026-09-01",
                    "time": "09:30",
                    "type": "consultation",
                    "duration_min": 30,
                    "fee": 150.0,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = read_json(resp).await;
        assert_eq!(created["start_time"], "2026-09-01 09:30:00");
        assert_eq!(created["type"], "consultation");
        // No mailer or invoicing client is configured in tests.
        assert_eq!(created["invoice_sent"], false);
        assert_eq!(created["email_sent"], false);
        assert!(created.get("patient_email").is_none());
    }

    #[tokio::test]
    async fn appointment_with_unknown_code_is_404() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_code": "P-999",
                    "start_time": "2026-09-01 09:30:00",
                    "type": "checkup",
                    "duration_min": 30,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn appointment_without_patient_ref_is_400() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "start_time": "2026-09-01 09:30:00",
                    "type": "checkup",
                    "duration_min": 30,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    /// Create a patient and return its id.
    async fn seed_patient(app: &Router, cookies: &str, csrf: &str, name: &str) -> i64 {
        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/patients",
                cookies,
                csrf,
                Some(json!({ "name": name })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        read_json(resp).await["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn appointment_requires_type_and_duration() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;
        let pid = seed_patient(&app, &cookies, &csrf, "Ana").await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "start_time": "2026-09-01 09:30:00",
                    "duration_min": 30,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "start_time": "2026-09-01 09:30:00",
                    "type": "checkup",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn appointment_rejects_negative_fee() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;
        let pid = seed_patient(&app, &cookies, &csrf, "Ana").await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/appointments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "start_time": "2026-09-01 09:30:00",
                    "type": "checkup",
                    "duration_min": 30,
                    "fee": -25.0,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["error"]["code"], "BAD_REQUEST");

        // Nothing was persisted.
        let resp = app
            .oneshot(authed("GET", "/api/appointments", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(read_json(resp).await.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn payment_requires_method_and_status() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;
        let pid = seed_patient(&app, &cookies, &csrf, "Ana").await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({ "patient_id": pid, "amount": 10.0, "status": "paid" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({ "patient_id": pid, "amount": 10.0, "method": "cash" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn payment_rejects_negative_amount() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;
        let pid = seed_patient(&app, &cookies, &csrf, "Ana").await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "amount": -50.0,
                    "method": "cash",
                    "status": "paid",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(resp).await["error"]["code"], "BAD_REQUEST");

        let resp = app
            .oneshot(authed("GET", "/api/payments", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(read_json(resp).await.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn payment_rejects_malformed_currency_and_last4() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;
        let pid = seed_patient(&app, &cookies, &csrf, "Ana").await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "amount": 10.0,
                    "method": "card",
                    "status": "paid",
                    "currency": "US",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": pid,
                    "amount": 10.0,
                    "method": "card",
                    "status": "paid",
                    "last4": "123",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn payment_export_is_csv() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/patients",
                &cookies,
                &csrf,
                Some(json!({ "name": "Ana" })),
            ))
            .await
            .unwrap();
        let patient_id = read_json(resp).await["id"].as_i64().unwrap();

        let resp = app
            .clone()
            .oneshot(authed(
                "POST",
                "/api/payments",
                &cookies,
                &csrf,
                Some(json!({
                    "patient_id": patient_id,
                    "amount": 80.5,
                    "method": "cash",
                    "status": "paid",
                })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .oneshot(authed("GET", "/api/payments/export/csv", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let csv = String::from_utf8(body.to_vec()).unwrap();
        assert!(csv.starts_with("\"Payment Code\""));
        assert!(csv.contains("\"80.50\""));
        assert!(csv.contains("\"Ana\""));
    }

    #[tokio::test]
    async fn refresh_rotates_cookies_and_logout_clears() {
        let (app, _tmp) = test_app();
        let (cookies, _) = login(&app).await;

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/refresh")
                    .header(COOKIE, &cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get_all(SET_COOKIE).iter().count() >= 3);

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/logout")
                    .header(COOKIE, &cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cleared = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("at=;"));
        assert!(cleared);
    }

    #[tokio::test]
    async fn failed_refresh_is_401_and_sets_no_cookies() {
        use crate::auth::token::{sign_token, TokenKind};

        let (app, _tmp) = test_app();

        let expired = sign_token(1, TokenKind::Refresh, -10, "test-refresh-secret");
        let attempts = [
            None,
            Some("rt=garbage".to_string()),
            Some(format!("rt={expired}")),
        ];
        for cookie in attempts {
            let mut builder = Request::builder().method("POST").uri("/api/auth/refresh");
            if let Some(cookie) = &cookie {
                builder = builder.header(COOKIE, cookie);
            }
            let resp = app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            // No cookie may rotate on a rejected refresh.
            assert_eq!(resp.headers().get_all(SET_COOKIE).iter().count(), 0);
        }
    }

    #[tokio::test]
    async fn profile_roundtrip() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .clone()
            .oneshot(authed("GET", "/api/me", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["name"], "Dr. Silva");

        let resp = app
            .clone()
            .oneshot(authed(
                "PUT",
                "/api/me",
                &cookies,
                &csrf,
                Some(json!({ "new_password": "tiny" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .oneshot(authed(
                "PUT",
                "/api/me",
                &cookies,
                &csrf,
                Some(json!({ "name": "Dr. A. Silva" })),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["name"], "Dr. A. Silva");
    }

    #[tokio::test]
    async fn dashboard_stats_shape() {
        let (app, _tmp) = test_app();
        let (cookies, csrf) = login(&app).await;

        let resp = app
            .oneshot(authed("GET", "/api/dashboard/stats", &cookies, &csrf, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let stats = read_json(resp).await;
        assert_eq!(stats["patientsToday"], 0);
        assert_eq!(stats["totalRevenue"], 0.0);
    }
}
