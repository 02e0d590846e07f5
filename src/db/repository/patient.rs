use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::enums::Gender;
use crate::models::patient::{Patient, PatientLookup};

use super::column_err;

const PATIENT_COLUMNS: &str = "id, patient_code, name, email, phone, gender, dob, blood_type,
     allergies, medical_info, active, last_visit_at, created_at, updated_at";

fn map_patient(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let gender: Option<String> = row.get(5)?;
    Ok(Patient {
        id: row.get(0)?,
        patient_code: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        gender: gender
            .map(|g| Gender::from_str(&g).map_err(|e| column_err(5, e)))
            .transpose()?,
        dob: row.get(6)?,
        blood_type: row.get(7)?,
        allergies: row.get(8)?,
        medical_info: row.get(9)?,
        active: row.get(10)?,
        last_visit_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Fields accepted by create and partial update.
#[derive(Debug, Default)]
pub struct PatientInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub dob: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_info: Option<String>,
    pub active: Option<bool>,
}

/// Paged list with free-text search over name/email/phone/code.
pub fn list(
    conn: &Connection,
    query: &str,
    page: i64,
    limit: i64,
) -> Result<(Vec<Patient>, i64), DatabaseError> {
    let query = query.trim();
    let (where_sql, args): (&str, Vec<Value>) = if query.is_empty() {
        ("", vec![])
    } else {
        let like = format!("%{query}%");
        (
            "WHERE name LIKE ?1 OR email LIKE ?1 OR phone LIKE ?1 OR patient_code LIKE ?1",
            vec![like.into()],
        )
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM patient {where_sql}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let offset = (page - 1) * limit;
    let mut list_args = args;
    list_args.push(limit.into());
    list_args.push(offset.into());
    let limit_idx = list_args.len() - 1;

    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patient {where_sql}
         ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
        limit_idx,
        limit_idx + 1
    ))?;
    let rows = stmt.query_map(params_from_iter(list_args.iter()), map_patient)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?);
    }
    Ok((patients, total))
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE id = ?1"),
        params![id],
        map_patient,
    )
    .optional()
    .map_err(Into::into)
}

pub fn find_id_by_code(conn: &Connection, code: &str) -> Result<Option<i64>, DatabaseError> {
    conn.query_row(
        "SELECT id FROM patient WHERE patient_code = ?1 LIMIT 1",
        params![code],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Insert a patient and assign its human code from the rowid.
/// Runs inside the caller's transaction so the code assignment cannot
/// be observed half-done.
pub fn insert(conn: &Connection, input: &PatientInput) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient (name, email, phone, gender, dob, blood_type, allergies,
         medical_info, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            input.name.as_deref().unwrap_or_default(),
            input.email,
            input.phone,
            input.gender.map(|g| g.as_str()),
            input.dob,
            input.blood_type,
            input.allergies,
            input.medical_info,
            input.active.unwrap_or(true),
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE patient SET patient_code = printf('P-%03d', id) WHERE id = ?1",
        params![id],
    )?;
    Ok(id)
}

/// Partial update. `name` and `active` are preserved when absent;
/// the remaining fields are nullable-by-omission (the update contract
/// clears them when the body leaves them out).
pub fn update(conn: &Connection, id: i64, input: &PatientInput) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE patient SET
             name = COALESCE(?1, name),
             email = ?2,
             phone = ?3,
             gender = ?4,
             dob = ?5,
             blood_type = ?6,
             allergies = ?7,
             medical_info = ?8,
             active = COALESCE(?9, active),
             updated_at = datetime('now')
         WHERE id = ?10",
        params![
            input.name,
            input.email,
            input.phone,
            input.gender.map(|g| g.as_str()),
            input.dob,
            input.blood_type,
            input.allergies,
            input.medical_info,
            input.active,
            id,
        ],
    )?;
    Ok(n)
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM patient WHERE id = ?1", params![id])?)
}

/// Name-ordered `{id, label}` entries for dropdowns, capped at 200.
pub fn lookup(conn: &Connection, query: &str) -> Result<Vec<PatientLookup>, DatabaseError> {
    let query = query.trim();
    let (where_sql, args): (&str, Vec<Value>) = if query.is_empty() {
        ("", vec![])
    } else {
        let like = format!("%{query}%");
        ("WHERE name LIKE ?1 OR patient_code LIKE ?1", vec![like.into()])
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT id, patient_code, name FROM patient {where_sql} ORDER BY name ASC LIMIT 200"
    ))?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        let code: Option<String> = row.get(1)?;
        let name: String = row.get(2)?;
        Ok(PatientLookup {
            id: row.get(0)?,
            label: match code {
                Some(code) => format!("{name} ({code})"),
                None => name,
            },
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
