use crate::calc::StatusFilter;
use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::{nullable_str, optional_bool, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewStudent, StudentPatch};
use crate::pages::{self, RowFilters};
use crate::store::StudentFilter;
use serde_json::json;

pub(super) fn row_filters(params: &serde_json::Value) -> Result<RowFilters, AppError> {
    let status = match optional_str(params, "status")? {
        Some(raw) => StatusFilter::parse(raw)
            .ok_or_else(|| AppError::BadParams(format!("unknown status filter: {}", raw)))?,
        None => StatusFilter::All,
    };
    Ok(RowFilters {
        search: optional_str(params, "search")?.unwrap_or("").to_string(),
        status,
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let filter = if optional_bool(&req.params, "unassigned")?.unwrap_or(false) {
        StudentFilter::Unassigned
    } else {
        match optional_str(&req.params, "classId")? {
            Some(id) => StudentFilter::InClass(id.to_string()),
            None => StudentFilter::All,
        }
    };
    let students = state.repo()?.students(filter)?;
    Ok(json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let p = &req.params;
    let new = NewStudent {
        name: required_str(p, "name")?.to_string(),
        enrollment_code: optional_str(p, "enrollmentCode")?.map(str::to_string),
        class_id: optional_str(p, "classId")?.map(str::to_string),
    };
    let student = state.repo()?.create_student(new)?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let p = &req.params;
    let student_id = required_str(p, "studentId")?;
    let patch_obj = p
        .get("patch")
        .ok_or_else(|| AppError::BadParams("patch must be an object".into()))?;
    if !patch_obj.is_object() {
        return Err(AppError::BadParams("patch must be an object".into()));
    }
    let patch = StudentPatch {
        name: optional_str(patch_obj, "name")?.map(str::to_string),
        enrollment_code: nullable_str(patch_obj, "enrollmentCode")?,
        class_id: nullable_str(patch_obj, "classId")?,
    };
    let repo = state.repo()?;
    repo.update_student(student_id, patch)?;
    Ok(json!({ "student": repo.student(student_id)? }))
}

fn handle_students_assign_class(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let student_id = required_str(&req.params, "studentId")?;
    let Some(class_id) = nullable_str(&req.params, "classId")? else {
        return Err(AppError::BadParams("missing classId (null unassigns)".into()));
    };
    state.repo()?.assign_class(student_id, class_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let student_id = required_str(&req.params, "studentId")?;
    let outcome = state.repo()?.delete_student(student_id)?;
    Ok(json!({ "ok": true, "gradesDeleted": outcome.grades_deleted }))
}

fn handle_students_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let student_id = required_str(&req.params, "studentId")?;
    let grades = pages::student_history(state.repo()?, student_id)?;
    Ok(json!({ "grades": grades }))
}

fn handle_students_overview(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, AppError> {
    let prefs = state.teacher()?.prefs.clone();
    let filters = row_filters(&req.params)?;
    let class_id = optional_str(&req.params, "classId")?;
    let model = pages::students_overview(state.repo()?, class_id, &prefs, &filters)?;
    Ok(json!(model))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.update" => handle_students_update(state, req),
        "students.assignClass" => handle_students_assign_class(state, req),
        "students.delete" => handle_students_delete(state, req),
        "students.history" => handle_students_history(state, req),
        "students.overview" => handle_students_overview(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
