use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::required_str;
use crate::ipc::types::{AppState, Request};
use crate::store::StudentFilter;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    let selected = state.teacher()?.prefs.clone();
    let repo = state.repo()?;
    let classes = repo.classes()?;
    let students = repo.students(StudentFilter::All)?;

    // Counts so the shell can show class cards without another round trip.
    let rows: Vec<serde_json::Value> = classes
        .iter()
        .map(|c| {
            let student_count = students
                .iter()
                .filter(|s| s.class_id.as_deref() == Some(c.id.as_str()))
                .count();
            json!({
                "id": c.id,
                "name": c.name,
                "createdAt": c.created_at,
                "studentCount": student_count,
            })
        })
        .collect();
    let effective = selected.effective_class(&classes).map(|c| c.id.clone());
    Ok(json!({ "classes": rows, "selectedClassId": effective }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let name = required_str(&req.params, "name")?;
    let class = state.repo()?.create_class(name)?;
    Ok(json!({ "classId": class.id, "class": class }))
}

fn handle_classes_rename(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let class_id = required_str(&req.params, "classId")?;
    let name = required_str(&req.params, "name")?;
    state.repo()?.rename_class(class_id, name)?;
    Ok(json!({ "ok": true }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let class_id = required_str(&req.params, "classId")?;
    state.repo()?.delete_class(class_id)?;
    if let Some(active) = state.session.active_mut() {
        if active.prefs.selected_class_id.as_deref() == Some(class_id) {
            active.prefs.selected_class_id = None;
        }
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, req),
        "classes.create" => handle_classes_create(state, req),
        "classes.rename" => handle_classes_rename(state, req),
        "classes.delete" => handle_classes_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
