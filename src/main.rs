mod analysis;
mod db;
mod export;
mod ipc;
mod manual;
mod report;
mod scores;
mod sheet;
mod student;
mod workbook;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "REPORTD_LOG";
const WORKSPACE_ENV: &str = "REPORTD_WORKSPACE";

fn init_tracing() {
    // stdout carries the IPC stream; logs go to stderr.
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init();
}

fn main() {
    init_tracing();

    let mut state = ipc::AppState::new();
    if let Some(path) = std::env::var_os(WORKSPACE_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            tracing::error!(
                workspace = %path.to_string_lossy(),
                error = %format!("{e:#}"),
                "failed to open workspace"
            );
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    if state.dirty {
        if let Err(e) = state.save() {
            tracing::error!(error = %format!("{e:#}"), "failed to save workspace on exit");
        }
    }
}
