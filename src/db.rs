use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Stream and level are derived from form on read.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            form TEXT NOT NULL DEFAULT 'F1',
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_form ON students(form)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_form_name ON students(form, last_name, first_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            stream TEXT NOT NULL DEFAULT 'ALL'
        )",
        [],
    )?;
    // Workspaces created before form-level restrictions existed lack this column.
    ensure_subjects_form_level(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_name ON subjects(name)",
        [],
    )?;

    // Duplicate (student, subject, term) rows are allowed.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            term TEXT NOT NULL DEFAULT 'T1',
            score REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(student_id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student_term ON grades(student_id, term)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_subject_term ON grades(subject_id, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff_profiles(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'student',
            forms_responsible TEXT
        )",
        [],
    )?;

    tracing::debug!(path = %db_path.to_string_lossy(), "workspace database ready");
    Ok(conn)
}

fn ensure_subjects_form_level(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "subjects", "form_level")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE subjects ADD COLUMN form_level TEXT NOT NULL DEFAULT 'ALL'",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt setting {}", key))?,
        )),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    #[test]
    fn open_is_idempotent_and_migrates_subjects() {
        let ws = temp_workspace("gradebook-db");
        std::fs::create_dir_all(&ws).expect("create dir");
        {
            // A workspace from before form-level restrictions.
            let conn = Connection::open(ws.join(DB_FILE_NAME)).expect("open raw");
            conn.execute(
                "CREATE TABLE subjects(id TEXT PRIMARY KEY, name TEXT NOT NULL, stream TEXT NOT NULL DEFAULT 'ALL')",
                [],
            )
            .expect("create old table");
            conn.execute(
                "INSERT INTO subjects(id, name) VALUES('m', 'Mathematics')",
                [],
            )
            .expect("insert");
        }

        let conn = open_db(&ws).expect("open db");
        assert!(table_has_column(&conn, "subjects", "form_level").expect("pragma"));
        let level: String = conn
            .query_row("SELECT form_level FROM subjects WHERE id = 'm'", [], |r| {
                r.get(0)
            })
            .expect("row");
        assert_eq!(level, "ALL");
        drop(conn);

        open_db(&ws).expect("reopen db");
    }

    #[test]
    fn settings_roundtrip() {
        let conn = open_db(&temp_workspace("gradebook-settings")).expect("open db");
        assert_eq!(settings_get_json(&conn, "setup.school").expect("get"), None);
        settings_set_json(&conn, "setup.school", &json!({ "schoolName": "X" })).expect("set");
        settings_set_json(&conn, "setup.school", &json!({ "schoolName": "Y" })).expect("set");
        assert_eq!(
            settings_get_json(&conn, "setup.school").expect("get"),
            Some(json!({ "schoolName": "Y" }))
        );
    }

    #[test]
    fn deleting_a_student_cascades_to_grades() {
        let conn = open_db(&temp_workspace("gradebook-cascade")).expect("open db");
        conn.execute_batch(
            "INSERT INTO subjects(id, name) VALUES('e', 'English');
             INSERT INTO students(student_id, first_name, last_name, form, created_at)
               VALUES('S1', 'A', 'B', 'F1', '2024-01-01T00:00:00Z');
             INSERT INTO grades(id, student_id, subject_id, term, score, created_at)
               VALUES('g', 'S1', 'e', 'T1', 50, '2024-01-02T00:00:00Z');
             DELETE FROM students WHERE student_id = 'S1';",
        )
        .expect("batch");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 0);
    }
}
