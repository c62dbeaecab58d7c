mod auth;
mod cache;
mod calc;
mod config;
mod db;
mod demo;
mod error;
mod export;
mod ipc;
mod logging;
mod model;
mod pages;
mod repo;
mod session;
mod settings;
mod store;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};

fn main() {
    let config = config::DaemonConfig::parse();
    if let Err(e) = logging::init_logging(&config) {
        eprintln!("educonnectd: logging disabled: {e:#}");
    }

    let mut state = ipc::AppState::new(config.auth());
    if let Some(path) = config.workspace.as_deref() {
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            warn!(error = %e, "startup workspace not opened");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "educonnectd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to echo back.
            Err(e) => serde_json::json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() }
            }),
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
