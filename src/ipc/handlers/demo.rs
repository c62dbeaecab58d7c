use crate::demo;
use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::{optional_str, optional_u64};
use crate::ipc::types::{AppState, Request};
use crate::pages;
use serde_json::json;

fn handle_demo_generate(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let prefs = state.teacher()?.prefs.clone();
    let seed = optional_u64(&req.params, "seed")?;
    let class_id = optional_str(&req.params, "classId")?;
    let repo = state.repo()?;
    let Some(class) = pages::resolve_class(repo, class_id, &prefs)? else {
        return Err(AppError::Validation("select a class first".into()));
    };
    let report = demo::generate(repo, &class.id, seed, demo::today())?;
    Ok(json!({ "classId": class.id, "report": report }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "demo.generate" => handle_demo_generate(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
