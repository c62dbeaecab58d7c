use crate::db;
use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::required_str;
use crate::ipc::types::{AppState, Request};
use crate::repo::Repository;
use crate::store::SqliteStore;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "authenticated": state.session.active().is_some(),
    }))
}

/// Opens (creating if needed) the workspace database and makes it current.
/// Any signed-in session belongs to the previous workspace and is ended.
pub fn open_workspace(state: &mut AppState, path: &Path) -> Result<(), AppError> {
    let conn = db::open_db(path).map_err(|e| AppError::DbOpen(format!("{e:#}")))?;
    state.workspace = Some(path.to_path_buf());
    state.repo = Some(Repository::new(SqliteStore::new(conn)));
    state.session.end();
    info!(workspace = %path.to_string_lossy(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, AppError> {
    let path = PathBuf::from(required_str(&req.params, "path")?);
    open_workspace(state, &path)?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_cache_stats(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    let stats = state.repo()?.cache_stats();
    Ok(json!(stats))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "cache.stats" => handle_cache_stats(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
