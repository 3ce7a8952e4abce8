use crate::scores::ClassSummary;
use crate::student::StudentReport;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DB_FILE: &str = "reportd.sqlite3";

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_EXAM_TITLE: &str = "Talent Hunt Examination 2026";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            sort_order INTEGER NOT NULL,
            roll_no TEXT NOT NULL,
            name TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    // Workspaces created before review edits were persisted lack updated_at.
    ensure_students_updated_at(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS summary(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            payload_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS uploads(
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            header_row_index INTEGER NOT NULL,
            row_count INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
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

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
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

const SETTINGS_KEY: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub api_key: String,
    pub model: String,
    pub exam_title: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            exam_title: DEFAULT_EXAM_TITLE.to_string(),
        }
    }
}

pub fn load_settings(conn: &Connection) -> anyhow::Result<AppSettings> {
    match settings_get_json(conn, SETTINGS_KEY)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(AppSettings::default()),
    }
}

pub fn save_settings(conn: &Connection, settings: &AppSettings) -> anyhow::Result<()> {
    settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(settings)?)
}

/// Replaces the stored dataset with `students` and `summary` in one transaction.
pub fn save_students(
    conn: &mut Connection,
    students: &[StudentReport],
    summary: &ClassSummary,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM students", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO students(id, sort_order, roll_no, name, payload_json, updated_at)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        for (i, s) in students.iter().enumerate() {
            stmt.execute((
                uuid::Uuid::new_v4().to_string(),
                i as i64,
                &s.roll_no,
                &s.name,
                serde_json::to_string(s)?,
                &now,
            ))?;
        }
    }
    tx.execute(
        "INSERT INTO summary(id, payload_json) VALUES(1, ?)
         ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json",
        [serde_json::to_string(summary)?],
    )?;
    tx.commit()?;
    Ok(())
}

/// Stored students in order. Rows whose payload no longer parses are skipped.
pub fn load_students(conn: &Connection) -> anyhow::Result<Vec<StudentReport>> {
    let mut stmt = conn.prepare("SELECT id, payload_json FROM students ORDER BY sort_order")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out = Vec::with_capacity(rows.len());
    for (id, payload) in rows {
        let parsed = serde_json::from_str::<serde_json::Value>(&payload)
            .ok()
            .and_then(|v| StudentReport::from_json(&v));
        match parsed {
            Some(s) => out.push(s),
            None => tracing::warn!(id = %id, "skipping unreadable student row"),
        }
    }
    Ok(out)
}

pub struct UploadRecord<'a> {
    pub file_name: &'a str,
    pub fingerprint: &'a str,
    pub header_row_index: usize,
    pub row_count: usize,
}

pub fn record_upload(conn: &Connection, upload: &UploadRecord<'_>) -> anyhow::Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO uploads(id, file_name, fingerprint, header_row_index, row_count, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            upload.file_name,
            upload.fingerprint,
            upload.header_row_index as i64,
            upload.row_count as i64,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(id)
}

/// Number of earlier uploads with the same fingerprint.
pub fn upload_seen_count(conn: &Connection, fingerprint: &str) -> anyhow::Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM uploads WHERE fingerprint = ?",
        [fingerprint],
        |row| row.get(0),
    )?;
    Ok(n)
}
