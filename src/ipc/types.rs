use std::path::PathBuf;

use crate::db::{self, AppSettings};
use crate::scores::ClassSummary;
use crate::student::{self, StudentReport};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub settings: AppSettings,
    pub students: Vec<StudentReport>,
    pub summary: ClassSummary,
    /// Dataset changed since the last save.
    pub dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            settings: AppSettings::default(),
            students: Vec::new(),
            summary: student::class_summary(&[]),
            dirty: false,
        }
    }

    /// Recomputes the class summary after any change to `students`.
    pub fn touch_students(&mut self) {
        self.summary = student::class_summary(&self.students);
        self.dirty = true;
    }

    pub fn replace_students(&mut self, students: Vec<StudentReport>) {
        self.students = students;
        self.touch_students();
    }

    /// Persists settings and the dataset when a workspace is open. Returns
    /// whether anything was written.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        let Some(conn) = self.db.as_mut() else {
            return Ok(false);
        };
        db::save_settings(conn, &self.settings)?;
        db::save_students(conn, &self.students, &self.summary)?;
        self.dirty = false;
        tracing::info!(students = self.students.len(), "workspace saved");
        Ok(true)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
