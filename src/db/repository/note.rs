use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::note::PatientNote;

fn map_note(row: &Row<'_>) -> rusqlite::Result<PatientNote> {
    Ok(PatientNote {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        author_user_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const NOTE_COLUMNS: &str =
    "id, patient_id, title, content, author_user_id, created_at, updated_at";

pub fn list_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<PatientNote>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM patient_note WHERE patient_id = ?1
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id], map_note)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get(
    conn: &Connection,
    id: i64,
    patient_id: i64,
) -> Result<Option<PatientNote>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {NOTE_COLUMNS} FROM patient_note WHERE id = ?1 AND patient_id = ?2"),
        params![id, patient_id],
        map_note,
    )
    .optional()
    .map_err(Into::into)
}

pub fn insert(
    conn: &Connection,
    patient_id: i64,
    title: &str,
    content: Option<&str>,
    author_user_id: Option<i64>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_note (patient_id, title, content, author_user_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![patient_id, title, content, author_user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Partial update: title preserved when absent, content/author
/// nullable-by-omission.
pub fn update(
    conn: &Connection,
    id: i64,
    patient_id: i64,
    title: Option<&str>,
    content: Option<&str>,
    author_user_id: Option<i64>,
) -> Result<usize, DatabaseError> {
    let n = conn.execute(
        "UPDATE patient_note SET
             title = COALESCE(?1, title),
             content = ?2,
             author_user_id = ?3,
             updated_at = datetime('now')
         WHERE id = ?4 AND patient_id = ?5",
        params![title, content, author_user_id, id, patient_id],
    )?;
    Ok(n)
}

pub fn delete(conn: &Connection, id: i64, patient_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM patient_note WHERE id = ?1 AND patient_id = ?2",
        params![id, patient_id],
    )?)
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

    #[test]
    fn notes_are_scoped_to_patient() {
        let conn = open_memory_database().unwrap();
        let p1 = seed_patient(&conn);
        let p2 = seed_patient(&conn);
        let note = insert(&conn, p1, "Intake", Some("First visit"), None).unwrap();

        assert_eq!(list_for_patient(&conn, p1).unwrap().len(), 1);
        assert!(list_for_patient(&conn, p2).unwrap().is_empty());
        // Wrong patient id cannot read or delete the note.
        assert!(get(&conn, note, p2).unwrap().is_none());
        assert_eq!(delete(&conn, note, p2).unwrap(), 0);
    }

    #[test]
    fn update_keeps_title_clears_content() {
        let conn = open_memory_database().unwrap();
        let pid = seed_patient(&conn);
        conn.execute(
            "INSERT INTO app_user (name, email, password_hash) VALUES ('Dr', 'dr@x.test', 'h')",
            [],
        )
        .unwrap();
        let author = conn.last_insert_rowid();
        let note = insert(&conn, pid, "Intake", Some("Old content"), Some(author)).unwrap();

        update(&conn, note, pid, None, None, None).unwrap();
        let n = get(&conn, note, pid).unwrap().unwrap();
        assert_eq!(n.title, "Intake");
        assert_eq!(n.content, None);
        assert_eq!(n.author_user_id, None);
    }
}
