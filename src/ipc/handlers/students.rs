use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_index, required_param};
use crate::ipc::types::{AppState, Request};
use crate::scores;
use crate::student::{self, StudentPatch};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "students": state.students, "summary": state.summary }),
    )
}

/// Position of the student addressed by `params.rollNo`.
pub fn find_by_roll_no(state: &AppState, req: &Request) -> Result<usize, serde_json::Value> {
    let Some(roll_no) = req.params.get("rollNo").and_then(student::scalar_string) else {
        return Err(err(&req.id, "bad_params", "missing rollNo", None));
    };
    state
        .students
        .iter()
        .position(|s| s.roll_no == roll_no)
        .ok_or_else(|| {
            err(
                &req.id,
                "not_found",
                format!("no student with roll no {roll_no}"),
                None,
            )
        })
}

fn checked_index(state: &AppState, req: &Request) -> Result<usize, serde_json::Value> {
    let index = required_index(req, "index")?;
    if index >= state.students.len() {
        return Err(err(
            &req.id,
            "not_found",
            format!("student index {index} out of range"),
            Some(json!({ "count": state.students.len() })),
        ));
    }
    Ok(index)
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let idx = match find_by_roll_no(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "index": idx, "student": state.students[idx] }),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let index = match checked_index(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: StudentPatch = match required_param(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };
    patch.apply(&mut state.students[index]);
    state.touch_students();
    ok(
        &req.id,
        json!({ "student": state.students[index], "summary": state.summary }),
    )
}

fn handle_students_set_subject_score(state: &mut AppState, req: &Request) -> serde_json::Value {
    let index = match checked_index(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_index = match required_index(req, "subjectIndex") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(score) = req.params.get("score") else {
        return err(&req.id, "bad_params", "missing score", None);
    };
    let score = scores::coerce_number(score);
    if !state.students[index].set_subject_score(subject_index, score) {
        return err(
            &req.id,
            "not_found",
            format!("subject index {subject_index} out of range"),
            None,
        );
    }
    state.touch_students();
    ok(
        &req.id,
        json!({ "student": state.students[index], "summary": state.summary }),
    )
}

fn handle_students_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let removed = state.students.len();
    state.replace_students(Vec::new());
    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.setSubjectScore" => Some(handle_students_set_subject_score(state, req)),
        "students.clear" => Some(handle_students_clear(state, req)),
        _ => None,
    }
}
