use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, db_err, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "studentCount": state.students.len(),
            "dirty": state.dirty,
        }),
    )
}

/// Opens (creating if needed) the workspace at `path` and loads its settings
/// and students into `state`. A previously open workspace is saved first.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    if state.dirty {
        state.save()?;
    }
    let conn = db::open_db(path)?;
    let settings = db::load_settings(&conn)?;
    let students = db::load_students(&conn)?;

    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.settings = settings;
    state.replace_students(students);
    state.dirty = false;
    tracing::info!(
        workspace = %path.to_string_lossy(),
        students = state.students.len(),
        "workspace opened"
    );
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "studentCount": state.students.len(),
                "settings": state.settings,
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn handle_workspace_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = db_conn(state, req) {
        return e;
    }
    match state.save() {
        Ok(_) => ok(&req.id, json!({ "saved": state.students.len() })),
        Err(e) => db_err(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "workspace.save" => Some(handle_workspace_save(state, req)),
        _ => None,
    }
}
