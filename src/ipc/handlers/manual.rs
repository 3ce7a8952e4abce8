use crate::ipc::error::ok;
use crate::ipc::helpers::required_param;
use crate::ipc::types::{AppState, Request};
use crate::manual::{self, EntryNode, ManualProfile, SheetStudent};
use crate::scores;
use serde_json::json;

fn handle_manual_analysis_input(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let profile: ManualProfile = match required_param(req, "profile") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let tree: Vec<EntryNode> = match required_param(req, "tree") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, manual::analysis_input(&profile, &tree))
}

fn handle_manual_flatten(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let tree: Vec<EntryNode> = match required_param(req, "tree") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = manual::flatten_subjects(&tree);
    let breakdown = scores::breakdown(&subjects);
    ok(
        &req.id,
        json!({ "subjects": subjects, "breakdown": breakdown }),
    )
}

fn handle_manual_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let profile: ManualProfile = match required_param(req, "profile") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let tree: Vec<EntryNode> = match required_param(req, "tree") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student = manual::generate_student(&profile, &tree);
    state.students.push(student);
    state.touch_students();
    let index = state.students.len() - 1;
    ok(
        &req.id,
        json!({
            "index": index,
            "student": state.students[index],
            "summary": state.summary,
        }),
    )
}

fn handle_manual_sheet_layout(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let template: Vec<EntryNode> = match required_param(req, "template") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students: Vec<SheetStudent> = match required_param(req, "students") {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(manual::sheet_layout(&template, &students)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "manual.analysisInput" => Some(handle_manual_analysis_input(state, req)),
        "manual.flatten" => Some(handle_manual_flatten(state, req)),
        "manual.generate" => Some(handle_manual_generate(state, req)),
        "manual.sheetLayout" => Some(handle_manual_sheet_layout(state, req)),
        _ => None,
    }
}
