use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::enums::{PayMethod, PayStatus};
use crate::models::payment::Payment;

use super::{column_err, push_date_range};

const PAYMENT_SELECT: &str = "SELECT pmt.id, pmt.payment_code, pmt.patient_id, pmt.appointment_id,
        pmt.amount, pmt.currency, pmt.method, pmt.status, pmt.description,
        pmt.transaction_ref, pmt.last4, pmt.created_at,
        pat.name, pat.patient_code, ap.appt_code, pat.email
     FROM payment pmt
     JOIN patient pat ON pat.id = pmt.patient_id
     LEFT JOIN appointment ap ON ap.id = pmt.appointment_id";

fn map_payment(row: &Row<'_>, with_contact: bool) -> rusqlite::Result<Payment> {
    let method: String = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(Payment {
        id: row.get(0)?,
        payment_code: row.get(1)?,
        patient_id: row.get(2)?,
        appointment_id: row.get(3)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        method: PayMethod::from_str(&method).map_err(|e| column_err(6, e))?,
        status: PayStatus::from_str(&status).map_err(|e| column_err(7, e))?,
        description: row.get(8)?,
        transaction_ref: row.get(9)?,
        last4: row.get(10)?,
        created_at: row.get(11)?,
        patient_name: row.get(12)?,
        patient_code: row.get(13)?,
        appt_code: row.get(14)?,
        patient_email: if with_contact { row.get(15)? } else { None },
    })
}

#[derive(Debug, Default)]
pub struct PaymentFilters<'a> {
    pub search: Option<&'a str>,
    pub method: Option<PayMethod>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
}

#[derive(Debug)]
pub struct NewPayment {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub amount: f64,
    pub currency: String,
    pub method: PayMethod,
    pub status: PayStatus,
    pub description: Option<String>,
    pub transaction_ref: Option<String>,
    pub last4: Option<String>,
}

/// Fields accepted by partial update. Core fields are preserved when
/// absent; description/transaction_ref/last4 are nullable-by-omission.
#[derive(Debug, Default)]
pub struct PaymentChanges {
    pub patient_id: Option<i64>,
    pub appointment_id: Option<i64>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub method: Option<PayMethod>,
    pub status: Option<PayStatus>,
    pub description: Option<String>,
    pub transaction_ref: Option<String>,
    pub last4: Option<String>,
}

fn filter_sql(filters: &PaymentFilters<'_>) -> (String, Vec<Value>) {
    let mut where_parts: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();

    if let Some(search) = filters.search.map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{search}%");
        where_parts.push(
            "(pmt.payment_code LIKE ? OR pat.name LIKE ? OR pat.patient_code LIKE ?)".into(),
        );
        args.push(like.clone().into());
        args.push(like.clone().into());
        args.push(like.into());
    }
    if let Some(method) = filters.method {
        where_parts.push("pmt.method = ?".into());
        args.push(method.as_str().to_string().into());
    }
    push_date_range("pmt.created_at", filters.from, filters.to, &mut where_parts, &mut args);

    let where_sql = if where_parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", where_parts.join(" AND "))
    };
    (where_sql, args)
}

fn run_list(
    conn: &Connection,
    where_sql: &str,
    args: &[Value],
    limit_sql: &str,
) -> Result<Vec<Payment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{PAYMENT_SELECT} {where_sql} ORDER BY pmt.created_at DESC, pmt.id DESC {limit_sql}"
    ))?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| map_payment(row, false))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Filtered list, most recent first, capped at 1000.
pub fn list(conn: &Connection, filters: &PaymentFilters<'_>) -> Result<Vec<Payment>, DatabaseError> {
    let (where_sql, args) = filter_sql(filters);
    run_list(conn, &where_sql, &args, "LIMIT 1000")
}

/// Uncapped listing for CSV export, same filters as `list`.
pub fn list_for_export(
    conn: &Connection,
    filters: &PaymentFilters<'_>,
) -> Result<Vec<Payment>, DatabaseError> {
    let (where_sql, args) = filter_sql(filters);
    run_list(conn, &where_sql, &args, "")
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Payment>, DatabaseError> {
    conn.query_row(
        &format!("{PAYMENT_SELECT} WHERE pmt.id = ?1"),
        params![id],
        |row| map_payment(row, false),
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_with_contact(conn: &Connection, id: i64) -> Result<Option<Payment>, DatabaseError> {
    conn.query_row(
        &format!("{PAYMENT_SELECT} WHERE pmt.id = ?1"),
        params![id],
        |row| map_payment(row, true),
    )
    .optional()
    .map_err(Into::into)
}

/// Insert and assign the `PAY-%06d` code, inside the caller's
/// transaction.
pub fn insert(conn: &Connection, new: &NewPayment) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO payment (patient_id, appointment_id, amount, currency, method, status,
         description, transaction_ref, last4)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.patient_id,
            new.appointment_id,
            new.amount,
            new.currency,
            new.method.as_str(),
            new.status.as_str(),
            new.description,
            new.transaction_ref,
            new.last4,
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE payment SET payment_code = printf('PAY-%06d', id) WHERE id = ?1",
        params![id],
    )?;
    Ok(id)
}

pub fn update(conn: &Connection, id: i64, changes: &PaymentChanges) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE payment SET
             patient_id = COALESCE(?1, patient_id),
             appointment_id = ?2,
             amount = COALESCE(?3, amount),
             currency = COALESCE(?4, currency),
             method = COALESCE(?5, method),
             status = COALESCE(?6, status),
             description = ?7,
             transaction_ref = ?8,
             last4 = ?9
         WHERE id = ?10",
        params![
            changes.patient_id,
            changes.appointment_id,
            changes.amount,
            changes.currency,
            changes.method.map(|m| m.as_str()),
            changes.status.map(|s| s.as_str()),
            changes.description,
            changes.transaction_ref,
            changes.last4,
            id,
        ],
    )?;
    Ok(n)
}

/// One-directional status transition; re-applying leaves the status
/// `refunded` (idempotent in effect).
pub fn mark_refunded(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE payment SET status = 'refunded' WHERE id = ?1",
        params![id],
    )?)
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM payment WHERE id = ?1", params![id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::patient::{self, PatientInput};

    fn seed_patient(conn: &Connection) -> i64 {
        patient::insert(
            conn,
            &PatientInput {
                name: Some("Ana".into()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn cash_payment(patient_id: i64, amount: f64) -> NewPayment {
        NewPayment {
            patient_id,
            appointment_id: None,
            amount,
            currency: "USD".into(),
            method: PayMethod::Cash,
            status: PayStatus::Paid,
            description: None,
            transaction_ref: None,
            last4: None,
        }
    }

    #[test]
    fn insert_assigns_code() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        let id = insert(&conn, &cash_payment(pid, 50.0)).unwrap();
        let p = get(&conn, id).unwrap().unwrap();
        assert_eq!(p.payment_code.as_deref(), Some(format!("PAY-{id:06}").as_str()));
        assert_eq!(p.patient_name, "Ana");
    }

    #[test]
    fn list_filters_by_method() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        insert(&conn, &cash_payment(pid, 10.0)).unwrap();
        insert(
            &conn,
            &NewPayment {
                method: PayMethod::Card,
                last4: Some("4242".into()),
                ..cash_payment(pid, 20.0)
            },
        )
        .unwrap();

        let cards = list(
            &conn,
            &PaymentFilters {
                method: Some(PayMethod::Card),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].amount, 20.0);
    }

    #[test]
    fn schema_rejects_negative_amount() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        assert!(insert(&conn, &cash_payment(pid, -50.0)).is_err());
    }

    #[test]
    fn refund_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        let id = insert(&conn, &cash_payment(pid, 10.0)).unwrap();

        mark_refunded(&conn, id).unwrap();
        assert_eq!(get(&conn, id).unwrap().unwrap().status, PayStatus::Refunded);

        mark_refunded(&conn, id).unwrap();
        assert_eq!(get(&conn, id).unwrap().unwrap().status, PayStatus::Refunded);
    }

    #[test]
    fn update_coalesces_core_fields() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        let id = insert(
            &conn,
            &NewPayment {
                description: Some("deposit".into()),
                ..cash_payment(pid, 80.0)
            },
        )
        .unwrap();

        update(
            &conn,
            id,
            &PaymentChanges {
                amount: Some(90.0),
                ..Default::default()
            },
        )
        .unwrap();

        let p = get(&conn, id).unwrap().unwrap();
        assert_eq!(p.amount, 90.0);
        assert_eq!(p.method, PayMethod::Cash);
        // Nullable-by-omission contract clears it.
        assert_eq!(p.description, None);
    }
}
