//! The signed-in user's own profile, including avatar upload.

use std::path::Path as FsPath;

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{ApiContext, AuthUser};
use crate::auth::password::hash_password;
use crate::db::repository::user;
use crate::models::user::PublicUser;

const MAX_AVATAR_BYTES: usize = 3 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct ProfileBody {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "newPassword")]
    pub new_password: Option<String>,
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<PublicUser>> {
    let conn = ctx.db.get();
    user::get_public(&conn, auth.id)?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ProfileBody>,
) -> ApiResult<Json<PublicUser>> {
    let password_hash = match body.new_password.as_deref() {
        Some(pw) if pw.len() < 6 => {
            return Err(ApiError::BadRequest(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        Some(pw) => Some(hash_password(pw).map_err(|e| ApiError::Internal(e.to_string()))?),
        None => None,
    };

    let conn = ctx.db.get();
    user::update_profile(
        &conn,
        auth.id,
        body.name.as_deref(),
        body.email.as_deref(),
        password_hash.as_deref(),
    )?;
    user::get_public(&conn, auth.id)?
        .map(Json)
        .ok_or(ApiError::Unauthorized)
}

fn extension_for(content_type: &str, filename: Option<&str>) -> &'static str {
    match content_type {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        _ => match filename
            .and_then(|f| FsPath::new(f).extension())
            .and_then(|e| e.to_str())
        {
            Some("png") => ".png",
            Some("jpg") | Some("jpeg") => ".jpg",
            Some("gif") => ".gif",
            Some("webp") => ".webp",
            _ => ".img",
        },
    }
}

pub async fn upload_avatar(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("avatar") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::BadRequest("Avatar must be an image".to_string()));
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::BadRequest("Avatar exceeds 3MB".to_string()));
        }

        let ext = extension_for(&content_type, filename.as_deref());
        let name = format!("avatar_{}{ext}", Utc::now().timestamp_millis());
        let path = FsPath::new(&ctx.config.upload_dir).join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        let url = format!("/{}/{name}", ctx.config.upload_dir.trim_matches('/'));
        let conn = ctx.db.get();
        user::set_avatar(&conn, auth.id, &url)?;
        return Ok(Json(json!({ "avatarUrl": url })));
    }

    Err(ApiError::BadRequest("avatar field missing".to_string()))
}
