use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::user::PublicUser;

fn map_public(row: &Row<'_>) -> rusqlite::Result<PublicUser> {
    Ok(PublicUser {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        avatar_url: row.get(4)?,
    })
}

/// Credential lookup for login: public fields plus the stored hash.
/// The hash stays inside the auth flow and is never serialized.
pub fn find_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<(PublicUser, String)>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, email, role, avatar_url, password_hash
         FROM app_user WHERE email = ?1 LIMIT 1",
        params![email],
        |row| {
            let user = map_public(row)?;
            let hash: String = row.get(5)?;
            Ok((user, hash))
        },
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_public(conn: &Connection, id: i64) -> Result<Option<PublicUser>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, email, role, avatar_url FROM app_user WHERE id = ?1",
        params![id],
        map_public,
    )
    .optional()
    .map_err(Into::into)
}

/// Profile update: every field preserved when absent.
pub fn update_profile(
    conn: &Connection,
    id: i64,
    name: Option<&str>,
    email: Option<&str>,
    password_hash: Option<&str>,
) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE app_user SET
             name = COALESCE(?1, name),
             email = COALESCE(?2, email),
             password_hash = COALESCE(?3, password_hash)
         WHERE id = ?4",
        params![name, email, password_hash, id],
    )?;
    Ok(n)
}

pub fn set_avatar(conn: &Connection, id: i64, avatar_url: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE app_user SET avatar_url = ?1 WHERE id = ?2",
        params![avatar_url, id],
    )?)
}

/// Create a staff account; used by seeding and tests.
pub fn insert(
    conn: &Connection,
    name: &str,
    email: &str,
    role: &str,
    password_hash: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO app_user (name, email, role, password_hash) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, role, password_hash],
    )?;
    Ok(conn.last_insert_rowid())
}
