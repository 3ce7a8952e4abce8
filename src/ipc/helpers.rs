use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_index(req: &Request, key: &str) -> Result<usize, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("missing or invalid {}", key),
                None,
            )
        })
}

/// Deserializes `params[key]` into a typed payload.
pub fn required_param<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<T, serde_json::Value> {
    let Some(v) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(v.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {}", key, e),
            None,
        )
    })
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn io_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    tracing::warn!(method = %req.method, error = %format!("{e:#}"), "io failure");
    err(&req.id, "io_failed", format!("{e:#}"), None)
}

pub fn db_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    tracing::warn!(method = %req.method, error = %format!("{e:#}"), "database failure");
    err(&req.id, "db_query_failed", format!("{e:#}"), None)
}
