use crate::db;
use crate::ipc::error::{coded, err, ok};
use crate::ipc::helpers::{db_err, required_str};
use crate::ipc::types::{AppState, Request};
use crate::sheet::{self, NormalizedRow, ReconstructedSheet};
use crate::workbook::{self, UnsupportedFormat};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

fn reconstruct_or_err(
    req: &Request,
    grid: &sheet::RawGrid,
) -> Result<ReconstructedSheet, serde_json::Value> {
    sheet::reconstruct(grid).map_err(|e| coded(&req.id, e.code(), &e))
}

/// SHA-256 over the JSON of the normalized rows.
pub fn fingerprint(rows: &[NormalizedRow]) -> anyhow::Result<String> {
    let bytes = serde_json::to_vec(rows)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

fn handle_sheet_reconstruct(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(grid) = req.params.get("grid").and_then(sheet::grid_from_json) else {
        return err(&req.id, "bad_params", "missing grid (array of rows)", None);
    };
    match reconstruct_or_err(req, &grid) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => e,
    }
}

fn handle_sheet_parse(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let grid = match workbook::decode_path(&path) {
        Ok(v) => v,
        Err(e) => {
            if let Some(u) = e.downcast_ref::<UnsupportedFormat>() {
                return coded(&req.id, "workbook_unsupported", u);
            }
            return err(&req.id, "workbook_unreadable", format!("{e:#}"), None);
        }
    };
    let reconstructed = match reconstruct_or_err(req, &grid) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let fp = match fingerprint(&reconstructed.rows) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "io_failed", format!("{e:#}"), None),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut upload_id = None;
    let mut previous_uploads = 0i64;
    if let Some(conn) = state.db.as_ref() {
        let recorded = db::upload_seen_count(conn, &fp).and_then(|seen| {
            let id = db::record_upload(
                conn,
                &db::UploadRecord {
                    file_name: &file_name,
                    fingerprint: &fp,
                    header_row_index: reconstructed.plan.header_row_index,
                    row_count: reconstructed.rows.len(),
                },
            )?;
            Ok((seen, id))
        });
        match recorded {
            Ok((seen, id)) => {
                previous_uploads = seen;
                upload_id = Some(id);
            }
            Err(e) => return db_err(req, e),
        }
    }
    if previous_uploads > 0 {
        tracing::warn!(file = %file_name, previous_uploads, "same sheet content uploaded before");
    }

    ok(
        &req.id,
        json!({
            "fileName": file_name,
            "fingerprint": fp,
            "uploadId": upload_id,
            "previousUploads": previous_uploads,
            "sheet": reconstructed,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sheet.reconstruct" => Some(handle_sheet_reconstruct(state, req)),
        "sheet.parse" => Some(handle_sheet_parse(state, req)),
        _ => None,
    }
}
