use serde::Serialize;

/// A staff account without its password hash. The hash never leaves
/// the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar_url: Option<String>,
}
