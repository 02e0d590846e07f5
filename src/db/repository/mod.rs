pub mod appointment;
pub mod dashboard;
pub mod note;
pub mod patient;
pub mod payment;
pub mod user;

use rusqlite::types::Type;

use super::DatabaseError;

/// Convert an enum-parse failure inside a `query_map` closure into a
/// rusqlite conversion error so it propagates through the row mapper.
pub(crate) fn column_err(idx: usize, e: DatabaseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Inclusive day-range filter: `from`/`to` arrive as `YYYY-MM-DD` and
/// are widened to whole days against a datetime column.
pub(crate) fn push_date_range(
    col: &str,
    from: Option<&str>,
    to: Option<&str>,
    where_parts: &mut Vec<String>,
    args: &mut Vec<rusqlite::types::Value>,
) {
    if let Some(from) = from.map(str::trim).filter(|s| !s.is_empty()) {
        where_parts.push(format!("{col} >= ?"));
        args.push(format!("{from} 00:00:00").into());
    }
    if let Some(to) = to.map(str::trim).filter(|s| !s.is_empty()) {
        where_parts.push(format!("{col} <= ?"));
        args.push(format!("{to} 23:59:59").into());
    }
}
