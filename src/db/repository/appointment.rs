use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::appointment::{Appointment, UnpaidAppointment};
use crate::models::enums::{ApptStatus, ApptType};

use super::{column_err, push_date_range};

/// Shared SELECT columns: appointment row + joined patient display
/// fields, with contact columns for the creation reselect.
const APPT_SELECT: &str = "SELECT a.id, a.appt_code, a.patient_id, a.start_time, a.duration_min,
        a.type, a.status, a.fee, a.notes, a.created_by, a.created_at, a.updated_at,
        p.name, p.patient_code, p.email, p.phone
     FROM appointment a
     JOIN patient p ON p.id = a.patient_id";

fn map_appointment(row: &Row<'_>, with_contact: bool) -> rusqlite::Result<Appointment> {
    let appt_type: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(Appointment {
        id: row.get(0)?,
        appt_code: row.get(1)?,
        patient_id: row.get(2)?,
        start_time: row.get(3)?,
        duration_min: row.get(4)?,
        appt_type: ApptType::from_str(&appt_type).map_err(|e| column_err(5, e))?,
        status: ApptStatus::from_str(&status).map_err(|e| column_err(6, e))?,
        fee: row.get(7)?,
        notes: row.get(8)?,
        created_by: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        patient_name: row.get(12)?,
        patient_code: row.get(13)?,
        patient_email: if with_contact { row.get(14)? } else { None },
        patient_phone: if with_contact { row.get(15)? } else { None },
    })
}

#[derive(Debug, Default)]
pub struct ApptFilters<'a> {
    pub search: Option<&'a str>,
    pub status: Option<ApptStatus>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

#[derive(Debug)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub start_time: String,
    pub duration_min: i64,
    pub appt_type: ApptType,
    pub status: ApptStatus,
    pub notes: Option<String>,
    pub fee: f64,
    pub created_by: Option<i64>,
}

/// Fields present in a partial update; only `Some` fields are touched.
#[derive(Debug, Default)]
pub struct ApptChanges {
    pub patient_id: Option<i64>,
    pub start_time: Option<String>,
    pub duration_min: Option<i64>,
    pub appt_type: Option<ApptType>,
    pub status: Option<ApptStatus>,
    pub notes: Option<Option<String>>,
    pub fee: Option<f64>,
}

/// Filtered list, most recent first, capped at 500.
pub fn list(conn: &Connection, filters: &ApptFilters<'_>) -> Result<Vec<Appointment>, DatabaseError> {
    let mut where_parts: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(search) = filters.search.map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        where_parts
            .push("(p.name LIKE ? OR p.patient_code LIKE ? OR a.appt_code LIKE ?)".into());
        args.push(like.clone().into());
        args.push(like.clone().into());
        args.push(like.into());
    }
    if let Some(status) = filters.status {
        where_parts.push("a.status = ?".into());
        args.push(status.as_str().to_string().into());
    }
    push_date_range("a.start_time", filters.from, filters.to, &mut where_parts, &mut args);

    let where_sql = if where_parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_parts.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!(
        "{APPT_SELECT} {where_sql} ORDER BY a.start_time DESC LIMIT 500"
    ))?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        map_appointment(row, false)
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Appointments with an outstanding balance: due = fee − Σ paid
/// payments, recomputed here and never stored. Overpaid rows fall out
/// via `HAVING due > 0`.
pub fn list_unpaid(conn: &Connection, q: &str) -> Result<Vec<UnpaidAppointment>, DatabaseError> {
    let q = q.trim();
    let mut where_parts = vec!["a.status IN ('scheduled', 'completed')".to_string()];
    let mut args: Vec<Value> = Vec::new();
    if !q.is_empty() {
        let like = format!("%{q}%");
        where_parts
            .push("(p.name LIKE ? OR p.patient_code LIKE ? OR a.appt_code LIKE ?)".into());
        args.push(like.clone().into());
        args.push(like.clone().into());
        args.push(like.into());
    }

    let sql = format!(
        "SELECT a.id, a.appt_code, a.start_time, a.duration_min, a.type, a.status, a.fee,
                a.notes, p.patient_code, p.name,
                COALESCE(SUM(CASE WHEN pay.status = 'paid' THEN pay.amount ELSE 0 END), 0)
                    AS paid_amount,
                (a.fee - COALESCE(SUM(CASE WHEN pay.status = 'paid' THEN pay.amount ELSE 0 END), 0))
                    AS due
         FROM appointment a
         JOIN patient p ON p.id = a.patient_id
         LEFT JOIN payment pay ON pay.appointment_id = a.id
         WHERE {}
         GROUP BY a.id
         HAVING due > 0
         ORDER BY a.start_time DESC
         LIMIT 500",
        where_parts.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
        let appt_type: String = row.get(4)?;
        let status: String = row.get(5)?;
        Ok(UnpaidAppointment {
            id: row.get(0)?,
            appt_code: row.get(1)?,
            start_time: row.get(2)?,
            duration_min: row.get(3)?,
            appt_type: ApptType::from_str(&appt_type).map_err(|e| column_err(4, e))?,
            status: ApptStatus::from_str(&status).map_err(|e| column_err(5, e))?,
            fee: row.get(6)?,
            notes: row.get(7)?,
            patient_code: row.get(8)?,
            patient_name: row.get(9)?,
            paid_amount: row.get(10)?,
            due: row.get(11)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Appointment>, DatabaseError> {
    conn.query_row(&format!("{APPT_SELECT} WHERE a.id = ?1"), params![id], |row| {
        map_appointment(row, false)
    })
    .optional()
    .map_err(Into::into)
}

/// Creation reselect: includes the patient's email/phone for the
/// side-effect chains.
pub fn get_with_contact(conn: &Connection, id: i64) -> Result<Option<Appointment>, DatabaseError> {
    conn.query_row(&format!("{APPT_SELECT} WHERE a.id = ?1"), params![id], |row| {
        map_appointment(row, true)
    })
    .optional()
    .map_err(Into::into)
}

/// Insert and assign the `APT-%06d` code from the rowid, inside the
/// caller's transaction.
pub fn insert(conn: &Connection, new: &NewAppointment) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO appointment (patient_id, start_time, duration_min, type, status, notes,
         fee, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.patient_id,
            new.start_time,
            new.duration_min,
            new.appt_type.as_str(),
            new.status.as_str(),
            new.notes,
            new.fee,
            new.created_by,
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE appointment SET appt_code = printf('APT-%06d', id) WHERE id = ?1",
        params![id],
    )?;
    Ok(id)
}

/// Dynamic partial update; returns affected rows (0 when absent).
pub fn update(conn: &Connection, id: i64, changes: &ApptChanges) -> Result<usize, DatabaseError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(patient_id) = changes.patient_id {
        sets.push("patient_id = ?");
        args.push(patient_id.into());
    }
    if let Some(start_time) = &changes.start_time {
        sets.push("start_time = ?");
        args.push(start_time.clone().into());
    }
    if let Some(duration_min) = changes.duration_min {
        sets.push("duration_min = ?");
        args.push(duration_min.into());
    }
    if let Some(appt_type) = changes.appt_type {
        sets.push("type = ?");
        args.push(appt_type.as_str().to_string().into());
    }
    if let Some(status) = changes.status {
        sets.push("status = ?");
        args.push(status.as_str().to_string().into());
    }
    if let Some(notes) = &changes.notes {
        sets.push("notes = ?");
        args.push(match notes {
            Some(n) => n.clone().into(),
            None => Value::Null,
        });
    }
    if let Some(fee) = changes.fee {
        sets.push("fee = ?");
        args.push(fee.into());
    }

    if sets.is_empty() {
        return Ok(0);
    }
    sets.push("updated_at = datetime('now')");
    args.push(id.into());

    let n = conn.execute(
        &format!("UPDATE appointment SET {} WHERE id = ?", sets.join(", ")),
        params_from_iter(args.iter()),
    )?;
    Ok(n)
}

pub fn set_status(conn: &Connection, id: i64, status: ApptStatus) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE appointment SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?)
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM appointment WHERE id = ?1", params![id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::patient::{self, PatientInput};

    fn seed_patient(conn: &Connection, name: &str) -> i64 {
        patient::insert(
            conn,
            &PatientInput {
                name: Some(name.into()),
                email: Some(format!("{}@example.com", name.to_lowercase())),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn seed_appt(conn: &Connection, patient_id: i64, start: &str, fee: f64) -> i64 {
        insert(
            conn,
            &NewAppointment {
                patient_id,
                start_time: start.into(),
                duration_min: 30,
                appt_type: ApptType::Checkup,
                status: ApptStatus::Scheduled,
                notes: None,
                fee,
                created_by: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn insert_assigns_code_and_joins_patient() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let id = seed_appt(&conn, pid, "2025-08-30 09:00:00", 150.0);

        let appt = get(&conn, id).unwrap().unwrap();
        assert_eq!(appt.appt_code.as_deref(), Some(format!("APT-{id:06}").as_str()));
        assert_eq!(appt.patient_name, "Ana");
        assert!(appt.patient_email.is_none());

        let with_contact = get_with_contact(&conn, id).unwrap().unwrap();
        assert_eq!(with_contact.patient_email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn schema_rejects_negative_fee() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let result = insert(
            &conn,
            &NewAppointment {
                patient_id: pid,
                start_time: "2025-08-30 09:00:00".into(),
                duration_min: 30,
                appt_type: ApptType::Checkup,
                status: ApptStatus::Scheduled,
                notes: None,
                fee: -1.0,
                created_by: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn list_filters_by_status_and_range() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        seed_appt(&conn, pid, "2025-08-30 09:00:00", 100.0);
        let late = seed_appt(&conn, pid, "2025-09-15 10:00:00", 100.0);
        set_status(&conn, late, ApptStatus::Completed).unwrap();

        let completed = list(
            &conn,
            &ApptFilters {
                status: Some(ApptStatus::Completed),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, late);

        let in_range = list(
            &conn,
            &ApptFilters {
                from: Some("2025-09-01"),
                to: Some("2025-09-30"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].start_time, "2025-09-15 10:00:00");
    }

    #[test]
    fn unpaid_recomputes_due() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let id = seed_appt(&conn, pid, "2025-08-30 09:00:00", 200.0);

        conn.execute(
            "INSERT INTO payment (patient_id, appointment_id, amount, currency, method, status)
             VALUES (?1, ?2, 50.0, 'USD', 'cash', 'paid')",
            params![pid, id],
        )
        .unwrap();
        // A pending payment must not count toward paid_amount.
        conn.execute(
            "INSERT INTO payment (patient_id, appointment_id, amount, currency, method, status)
             VALUES (?1, ?2, 150.0, 'USD', 'card', 'pending')",
            params![pid, id],
        )
        .unwrap();

        let unpaid = list_unpaid(&conn, "").unwrap();
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].paid_amount, 50.0);
        assert_eq!(unpaid[0].due, 150.0);
    }

    #[test]
    fn overpaid_appointment_drops_out_of_unpaid() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let id = seed_appt(&conn, pid, "2025-08-30 09:00:00", 100.0);
        conn.execute(
            "INSERT INTO payment (patient_id, appointment_id, amount, currency, method, status)
             VALUES (?1, ?2, 120.0, 'USD', 'cash', 'paid')",
            params![pid, id],
        )
        .unwrap();

        assert!(list_unpaid(&conn, "").unwrap().is_empty());
    }

    #[test]
    fn partial_update_touches_only_present_fields() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let id = seed_appt(&conn, pid, "2025-08-30 09:00:00", 100.0);

        update(
            &conn,
            id,
            &ApptChanges {
                fee: Some(175.0),
                notes: Some(Some("bring referral".into())),
                ..Default::default()
            },
        )
        .unwrap();

        let appt = get(&conn, id).unwrap().unwrap();
        assert_eq!(appt.fee, 175.0);
        assert_eq!(appt.notes.as_deref(), Some("bring referral"));
        assert_eq!(appt.start_time, "2025-08-30 09:00:00");
        assert_eq!(appt.duration_min, 30);
    }

    #[test]
    fn empty_update_is_noop() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn, "Ana");
        let id = seed_appt(&conn, pid, "2025-08-30 09:00:00", 100.0);
        assert_eq!(update(&conn, id, &ApptChanges::default()).unwrap(), 0);
    }
}
