use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

use crate::db::DatabaseError;

use super::push_date_range;

/// Headline numbers for the dashboard. Range-scoped fields honor the
/// optional `from`/`to` dates; the total/monthly revenue are global.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    #[serde(rename = "patientsToday")]
    pub patients_today: i64,
    #[serde(rename = "totalAppointments")]
    pub total_appointments: i64,
    #[serde(rename = "revenueToday")]
    pub revenue_today: f64,
    #[serde(rename = "totalRevenue")]
    pub total_revenue: f64,
    #[serde(rename = "averagePayment")]
    pub average_payment: f64,
    #[serde(rename = "monthlyRevenue")]
    pub monthly_revenue: f64,
}

fn range_where(col: &str, from: Option<&str>, to: Option<&str>) -> (String, Vec<Value>) {
    let mut parts = Vec::new();
    let mut args = Vec::new();
    push_date_range(col, from, to, &mut parts, &mut args);
    let sql = if parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", parts.join(" AND "))
    };
    (sql, args)
}

pub fn stats(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<DashboardStats, DatabaseError> {
    let (p_sql, p_args) = range_where("created_at", from, to);
    let patients_today: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM patient {p_sql}"),
        params_from_iter(p_args.iter()),
        |row| row.get(0),
    )?;

    let (a_sql, a_args) = range_where("start_time", from, to);
    let total_appointments: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM appointment {a_sql}"),
        params_from_iter(a_args.iter()),
        |row| row.get(0),
    )?;

    let (pay_sql, pay_args) = range_where("created_at", from, to);
    let (revenue_today, average_payment): (f64, f64) = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0),
                    COALESCE(AVG(amount), 0)
             FROM payment {pay_sql}"
        ),
        params_from_iter(pay_args.iter()),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let total_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0) FROM payment",
        [],
        |row| row.get(0),
    )?;

    let monthly_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0)
         FROM payment
         WHERE strftime('%Y-%m', created_at) = strftime('%Y-%m', 'now')",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        patients_today,
        total_appointments,
        revenue_today,
        total_revenue,
        average_payment,
        monthly_revenue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::patient::{self, PatientInput};

    #[test]
    fn stats_count_only_paid_revenue() {
        let conn = open_memory_database().unwrap();
        let pid = patient::insert(
            &conn,
            &PatientInput {
                name: Some("Ana".into()),
                ..Default::default()
            },
        )
        .unwrap();

        for (amount, status) in [(100.0, "paid"), (40.0, "pending"), (60.0, "paid")] {
            conn.execute(
                "INSERT INTO payment (patient_id, amount, currency, method, status)
                 VALUES (?1, ?2, 'USD', 'cash', ?3)",
                rusqlite::params![pid, amount, status],
            )
            .unwrap();
        }

        let s = stats(&conn, None, None).unwrap();
        assert_eq!(s.total_revenue, 160.0);
        assert_eq!(s.revenue_today, 160.0);
        assert_eq!(s.monthly_revenue, 160.0);
        assert_eq!(s.patients_today, 1);
        // Average spans all payments regardless of status.
        assert!((s.average_payment - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn range_excludes_out_of_window_rows() {
        let conn = open_memory_database().unwrap();
        patient::insert(
            &conn,
            &PatientInput {
                name: Some("Ana".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let s = stats(&conn, Some("1999-01-01"), Some("1999-01-31")).unwrap();
        assert_eq!(s.patients_today, 0);
        assert_eq!(s.revenue_today, 0.0);
    }
}
