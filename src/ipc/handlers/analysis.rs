use crate::analysis;
use crate::ipc::error::{coded, err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::scores::{self, SubjectRecord};
use serde_json::json;

fn handle_analysis_ingest(state: &mut AppState, req: &Request) -> serde_json::Value {
    let content = match required_str(req, "content") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result = match analysis::parse_analysis(&content) {
        Ok(v) => v,
        Err(e) => return coded(&req.id, e.code(), &e),
    };
    state.replace_students(result.students);
    ok(
        &req.id,
        json!({
            "students": state.students,
            "summary": state.summary,
            "dropped": result.dropped,
        }),
    )
}

fn handle_scores_aggregate(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(items) = req.params.get("subjects").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing subjects", None);
    };
    let subjects: Vec<SubjectRecord> = items
        .iter()
        .filter(|s| s.is_object())
        .map(SubjectRecord::from_json)
        .collect();
    let breakdown = scores::breakdown(&subjects);
    ok(
        &req.id,
        json!({
            "subjects": subjects,
            "categories": breakdown.categories,
            "categoryAverages": breakdown.category_averages,
            "totalPercentage": breakdown.total_percentage,
            "grade": breakdown.grade,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analysis.ingest" => Some(handle_analysis_ingest(state, req)),
        "scores.aggregate" => Some(handle_scores_aggregate(state, req)),
        _ => None,
    }
}
