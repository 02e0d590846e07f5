//! Normalization of heterogeneous client identifiers.
//!
//! Clients send patient references as a numeric id, a numeric string,
//! a human code (`P-004`), and sometimes the code lands in the id
//! field. One normalization step produces a [`PatientRef`] which the
//! rest of the write path consumes uniformly. Appointment start times
//! arrive either pre-combined or as a date + time pair and are always
//! stored as canonical `YYYY-MM-DD HH:MM:SS`.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::DatabaseError;

/// `patient_id` as it arrives on the wire: number or string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdOrCode {
    Num(i64),
    Str(String),
}

/// The normalized patient reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientRef {
    Numeric(i64),
    Code(String),
    Missing,
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("valid regex"))
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}:\d{2}(:\d{2})?$").expect("valid regex"))
}

impl PatientRef {
    /// Classify the `patient_id`/`patient_code` pair from a request
    /// body. A non-numeric string in the id field is treated as a
    /// code; an explicit `patient_code` wins over a code-shaped id.
    pub fn from_parts(patient_id: Option<&IdOrCode>, patient_code: Option<&str>) -> Self {
        match patient_id {
            Some(IdOrCode::Num(n)) => return PatientRef::Numeric(*n),
            Some(IdOrCode::Str(s)) if digits_re().is_match(s.trim()) => {
                if let Ok(n) = s.trim().parse::<i64>() {
                    return PatientRef::Numeric(n);
                }
            }
            _ => {}
        }

        if let Some(code) = patient_code.map(str::trim).filter(|c| !c.is_empty()) {
            return PatientRef::Code(code.to_string());
        }
        if let Some(IdOrCode::Str(s)) = patient_id {
            let s = s.trim();
            if !s.is_empty() {
                return PatientRef::Code(s.to_string());
            }
        }
        PatientRef::Missing
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither a numeric id nor a code-shaped value was present.
    Invalid,
    /// A code was given but matches no patient.
    NotFound(String),
    Db(String),
}

impl From<DatabaseError> for ResolveError {
    fn from(e: DatabaseError) -> Self {
        ResolveError::Db(e.to_string())
    }
}

/// Resolve a [`PatientRef`] to a canonical patient id.
pub fn resolve_patient_id(conn: &Connection, re: &PatientRef) -> Result<i64, ResolveError> {
    match re {
        PatientRef::Numeric(id) => Ok(*id),
        PatientRef::Code(code) => {
            match crate::db::repository::patient::find_id_by_code(conn, code) {
                Ok(Some(id)) => Ok(id),
                Ok(None) => Err(ResolveError::NotFound(code.clone())),
                Err(e) => Err(e.into()),
            }
        }
        PatientRef::Missing => Err(ResolveError::Invalid),
    }
}

/// Normalize a start timestamp from either a pre-combined string or a
/// date + time pair. Returns the canonical `YYYY-MM-DD HH:MM:SS` form,
/// or `None` if neither shape parses.
pub fn resolve_start_time(
    start_time: Option<&str>,
    date: Option<&str>,
    time: Option<&str>,
) -> Option<String> {
    if let Some(combined) = start_time.map(str::trim).filter(|s| !s.is_empty()) {
        let parsed = NaiveDateTime::parse_from_str(combined, "%Y-%m-%d %H:%M:%S").ok()?;
        return Some(parsed.format("%Y-%m-%d %H:%M:%S").to_string());
    }

    let (date, time) = (date?.trim(), time?.trim());
    // Date pickers often send a full ISO instant; only the date part
    // is significant.
    let date_only = if date.len() > 10 { date.get(..10)? } else { date };
    NaiveDate::parse_from_str(date_only, "%Y-%m-%d").ok()?;

    if !time_re().is_match(time) {
        return None;
    }
    let hhmmss = if time.len() == 5 {
        format!("{time}:00")
    } else {
        time.to_string()
    };

    Some(format!("{date_only} {hhmmss}"))
}
