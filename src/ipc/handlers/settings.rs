use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_err;
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPatch {
    api_key: Option<String>,
    model: Option<String>,
    exam_title: Option<String>,
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!(state.settings))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params = if req.params.is_null() {
        json!({})
    } else {
        req.params.clone()
    };
    let patch: SettingsPatch = match serde_json::from_value(params) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid settings: {e}"), None),
    };
    if let Some(v) = patch.api_key {
        state.settings.api_key = v.trim().to_string();
    }
    if let Some(v) = patch.model.filter(|m| !m.trim().is_empty()) {
        state.settings.model = v.trim().to_string();
    }
    if let Some(v) = patch.exam_title.filter(|t| !t.trim().is_empty()) {
        state.settings.exam_title = v.trim().to_string();
    }
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::save_settings(conn, &state.settings) {
            return db_err(req, e);
        }
    }
    ok(&req.id, json!(state.settings))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
