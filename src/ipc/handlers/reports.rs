use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{io_err, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;
use std::path::PathBuf;

use super::students::find_by_roll_no;

/// `params.examTitle` when given, else the configured title.
fn exam_title(state: &AppState, req: &Request) -> String {
    req.params
        .get("examTitle")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| state.settings.exam_title.clone())
}

fn handle_reports_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let idx = match find_by_roll_no(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let model = report::report_model(&state.students[idx], &exam_title(state, req));
    ok(&req.id, json!(model))
}

fn handle_reports_render_html(state: &mut AppState, req: &Request) -> serde_json::Value {
    let idx = match find_by_roll_no(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let model = report::report_model(&state.students[idx], &exam_title(state, req));
    ok(&req.id, json!({ "html": report::render_html(&model) }))
}

fn handle_reports_export_zip(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if state.students.is_empty() {
        return err(&req.id, "no_students", "no students to export", None);
    }
    match report::export_reports_zip(&state.students, &exam_title(state, req), &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "files": summary.files,
                "path": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => io_err(req, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.model" => Some(handle_reports_model(state, req)),
        "reports.renderHtml" => Some(handle_reports_render_html(state, req)),
        "reports.exportZip" => Some(handle_reports_export_zip(state, req)),
        _ => None,
    }
}
