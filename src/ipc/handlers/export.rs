use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{io_err, required_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::manual::{EntryNode, SheetStudent};
use crate::student::StudentReport;
use serde_json::json;
use std::path::{Path, PathBuf};

type VerifiedWriter = fn(&[StudentReport], &Path) -> anyhow::Result<usize>;
type LayoutWriter = fn(&[EntryNode], &[SheetStudent], &Path) -> anyhow::Result<usize>;

fn written(req: &Request, out_path: &Path, result: anyhow::Result<usize>) -> serde_json::Value {
    match result {
        Ok(rows) => ok(
            &req.id,
            json!({ "rows": rows, "path": out_path.to_string_lossy() }),
        ),
        Err(e) => io_err(req, e),
    }
}

fn handle_verified(
    state: &mut AppState,
    req: &Request,
    write: VerifiedWriter,
) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if state.students.is_empty() {
        return err(&req.id, "no_students", "no students to export", None);
    }
    written(req, &out_path, write(&state.students, &out_path))
}

fn handle_sheet_layout(req: &Request, write: LayoutWriter) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let template: Vec<EntryNode> = match required_param(req, "template") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students: Vec<SheetStudent> = match required_param(req, "students") {
        Ok(v) => v,
        Err(e) => return e,
    };
    written(req, &out_path, write(&template, &students, &out_path))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.xlsx" => Some(handle_verified(state, req, export::export_verified_xlsx)),
        "export.csv" => Some(handle_verified(state, req, export::export_verified_csv)),
        "export.sheetLayoutXlsx" => {
            Some(handle_sheet_layout(req, export::export_sheet_layout_xlsx))
        }
        "export.sheetLayoutCsv" => Some(handle_sheet_layout(req, export::export_sheet_layout_csv)),
        _ => None,
    }
}
