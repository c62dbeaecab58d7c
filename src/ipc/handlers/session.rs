use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::{nullable_str, optional_bool, required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::Route;
use serde_json::json;

fn handle_route_resolve(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let requested = Route::from_path(required_str(&req.params, "path")?);
    let resolution = state.session.resolve(requested);
    Ok(json!({
        "route": resolution.route,
        "path": resolution.route.path(),
        "redirected": resolution.redirected,
    }))
}

fn handle_session_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let dark_mode = optional_bool(&req.params, "darkMode")?;
    let selected = nullable_str(&req.params, "selectedClassId")?;
    if let Some(Some(class_id)) = selected.as_ref() {
        // Class selection is a teacher action.
        state.teacher()?;
        if class_id.trim().is_empty() {
            return Err(AppError::BadParams("selectedClassId must not be empty".into()));
        }
    }
    let active = state
        .session
        .active_mut()
        .ok_or(AppError::Unauthenticated)?;
    if let Some(dark) = dark_mode {
        active.prefs.dark_mode = dark;
    }
    if let Some(sel) = selected {
        active.prefs.selected_class_id = sel;
    }
    Ok(json!({ "prefs": active.prefs }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "route.resolve" => handle_route_resolve(state, req),
        "session.update" => handle_session_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
