use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::object;
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, SettingsError};
use serde_json::json;

fn handle_settings_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    state.signed_in()?;
    let conn = state.repo()?.store().conn();
    let display = settings::load_display(conn).map_err(|e| AppError::Io(format!("{e:#}")))?;
    Ok(json!({ "display": display }))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let patch = object(&req.params, "patch")?;
    let conn = state.repo()?.store().conn();
    let display = settings::update_display(conn, patch).map_err(|e| match e {
        SettingsError::Invalid(msg) => AppError::BadParams(msg),
        SettingsError::Storage(e) => AppError::Io(format!("{e:#}")),
    })?;
    Ok(json!({ "display": display }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, req),
        "settings.update" => handle_settings_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
