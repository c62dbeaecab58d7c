use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "educonnect.sqlite3";

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
    migrate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_name ON classes(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            enrollment_code TEXT,
            class_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_enrollment ON students(enrollment_code)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            value REAL NOT NULL,
            evaluated_on TEXT NOT NULL,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_class ON grades(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            confirmed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles(
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(id) REFERENCES accounts(id)
        )",
        [],
    )?;
    // Workspaces created before explicit student links have no student_id column.
    ensure_profiles_student_link(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_profiles_student ON profiles(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_profiles_student_link(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "profiles", "student_id")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE profiles ADD COLUMN student_id TEXT
           REFERENCES students(id) ON DELETE SET NULL",
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
    let Some(raw) = raw else {
        return Ok(None);
    };
    // A corrupt row reads as unset so callers fall back to defaults.
    Ok(serde_json::from_str(&raw).ok())
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value).context("failed to serialize setting")?;
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, &raw),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn migrate_is_idempotent() {
        let conn = open_in_memory().expect("open");
        migrate(&conn).expect("second migrate");
        assert!(table_has_column(&conn, "profiles", "student_id").expect("pragma"));
        assert!(table_has_column(&conn, "grades", "evaluated_on").expect("pragma"));
    }

    #[test]
    fn legacy_profiles_table_gains_student_link() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE accounts(id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE,
               password_salt TEXT NOT NULL, password_hash TEXT NOT NULL,
               confirmed INTEGER NOT NULL DEFAULT 0, created_at TEXT NOT NULL);
             CREATE TABLE profiles(id TEXT PRIMARY KEY, display_name TEXT NOT NULL,
               role TEXT NOT NULL, created_at TEXT NOT NULL);",
        )
        .expect("legacy schema");
        migrate(&conn).expect("migrate");
        assert!(table_has_column(&conn, "profiles", "student_id").expect("pragma"));
    }

    #[test]
    fn settings_roundtrip_and_corrupt_rows_read_as_unset() {
        let conn = open_in_memory().expect("open");
        assert_eq!(settings_get_json(&conn, "prefs.display").expect("get"), None);

        settings_set_json(&conn, "prefs.display", &json!({ "passThreshold": 7 })).expect("set");
        settings_set_json(&conn, "prefs.display", &json!({ "passThreshold": 5 })).expect("set");
        assert_eq!(
            settings_get_json(&conn, "prefs.display").expect("get"),
            Some(json!({ "passThreshold": 5 }))
        );

        conn.execute(
            "UPDATE settings SET value_json = '{not json' WHERE key = 'prefs.display'",
            [],
        )
        .expect("corrupt");
        assert_eq!(settings_get_json(&conn, "prefs.display").expect("get"), None);
    }
}
