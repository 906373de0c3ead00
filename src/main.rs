mod calc;
mod db;
mod error;
mod ipc;
mod quiz;
mod scale;
mod transcript;

use std::io::{self, BufRead, Write};

/// Env var holding the log filter (env_logger syntax).
const LOG_ENV: &str = "GRADEBOOKD_LOG";

fn main() {
    // stdout carries the protocol; logs go to stderr.
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let store = match db::Store::open_in_memory() {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to open grade store: {:?}", e);
            std::process::exit(1);
        }
    };
    let mut state = ipc::AppState { store };
    log::info!("gradebookd {} ready", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                log::error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                log::warn!("unparseable request: {}", e);
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

    log::info!("stdin closed, exiting");
}
