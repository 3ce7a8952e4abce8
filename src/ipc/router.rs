use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Family = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const FAMILIES: &[Family] = &[
    handlers::core::try_handle,
    handlers::settings::try_handle,
    handlers::sheets::try_handle,
    handlers::analysis::try_handle,
    handlers::students::try_handle,
    handlers::manual::try_handle,
    handlers::reports::try_handle,
    handlers::export::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let resp = FAMILIES
        .iter()
        .find_map(|family| family(state, &req))
        .unwrap_or_else(|| {
            err(
                &req.id,
                "not_implemented",
                format!("unknown method: {}", req.method),
                None,
            )
        });

    let ok = resp.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if ok {
        tracing::info!(method = %req.method, id = %req.id, "request ok");
    } else {
        let code = resp
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        tracing::info!(method = %req.method, id = %req.id, code, "request failed");
    }
    resp
}
