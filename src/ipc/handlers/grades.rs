use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::{optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::NewGrade;
use crate::repo::Repository;
use crate::store::{DateOrder, GradeFilter, RecordStore};
use serde_json::json;

fn parse_order(raw: Option<&str>) -> Result<DateOrder, AppError> {
    match raw {
        None | Some("desc") => Ok(DateOrder::Descending),
        Some("asc") => Ok(DateOrder::Ascending),
        Some(other) => Err(AppError::BadParams(format!("unknown order: {}", other))),
    }
}

/// Reads one grade. The class defaults to the student's current class.
fn parse_new_grade<S: RecordStore>(
    repo: &Repository<S>,
    p: &serde_json::Value,
) -> Result<NewGrade, AppError> {
    let student_id = required_str(p, "studentId")?.to_string();
    let class_id = match optional_str(p, "classId")? {
        Some(id) => id.to_string(),
        None => repo.student(&student_id)?.class_id.ok_or_else(|| {
            AppError::Validation("student is not assigned to a class".into())
        })?,
    };
    Ok(NewGrade {
        student_id,
        class_id,
        value: required_f64(p, "value")?,
        evaluated_on: required_str(p, "evaluatedOn")?.to_string(),
        kind: required_str(p, "kind")?.to_string(),
    })
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let p = &req.params;
    let filter = match (optional_str(p, "studentId")?, optional_str(p, "classId")?) {
        (Some(sid), _) => GradeFilter::Student(sid.to_string()),
        (None, Some(cid)) => GradeFilter::Class(cid.to_string()),
        (None, None) => GradeFilter::All,
    };
    let order = parse_order(optional_str(p, "order")?)?;
    let grades = state.repo()?.grades(filter, order)?;
    Ok(json!({ "grades": grades }))
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let repo = state.repo()?;
    if let Some(batch) = req.params.get("grades") {
        let items = batch
            .as_array()
            .ok_or_else(|| AppError::BadParams("grades must be an array".into()))?;
        let new = items
            .iter()
            .map(|item| parse_new_grade(repo, item))
            .collect::<Result<Vec<_>, _>>()?;
        let grades = repo.record_grades(new)?;
        return Ok(json!({ "grades": grades }));
    }
    let new = parse_new_grade(repo, &req.params)?;
    let grade = repo.record_grade(new)?;
    Ok(json!({ "gradeId": grade.id, "grade": grade }))
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let grade_id = required_str(&req.params, "gradeId")?;
    state.repo()?.delete_grade(grade_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.list" => handle_grades_list(state, req),
        "grades.create" => handle_grades_create(state, req),
        "grades.delete" => handle_grades_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
