use super::students::row_filters;
use crate::calc::{self, format_one_decimal};
use crate::error::AppError;
use crate::export;
use crate::ipc::error::respond;
use crate::ipc::params::{optional_bool, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::pages::{self, StudentRow};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_dashboard_model(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let prefs = state.teacher()?.prefs.clone();
    let filters = row_filters(&req.params)?;
    let class_id = optional_str(&req.params, "classId")?;
    let model = pages::dashboard(state.repo()?, class_id, &prefs, &filters)?;
    Ok(json!(model))
}

fn handle_reports_model(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let prefs = state.teacher()?.prefs.clone();
    let class_id = optional_str(&req.params, "classId")?;
    let model = pages::reports(state.repo()?, class_id, &prefs)?;
    Ok(json!(model))
}

fn handle_report_card(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let active = state.signed_in()?;
    let (role, profile_id) = (active.role(), active.profile.id.clone());
    let repo = state.repo()?;
    let student_id = match role {
        Role::Teacher => required_str(&req.params, "studentId")?.to_string(),
        // Students only ever see the record their profile links to.
        Role::Student => match repo.profile(&profile_id)?.student_id {
            Some(id) => id,
            None => return Ok(json!({ "linked": false })),
        },
    };
    let model = pages::report_card(repo, &student_id)?;
    let mut out = json!(model);
    out["linked"] = json!(true);
    Ok(out)
}

fn handle_class_stats(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let class_id = required_str(&req.params, "classId")?;
    let repo = state.repo()?;
    let (stats, grades) = pages::class_stats(repo, class_id)?;
    let average = calc::class_average(&stats);
    let rows: Vec<StudentRow> = stats.iter().map(StudentRow::from).collect();
    Ok(json!({
        "classId": class_id,
        "classAverage": average,
        "classAverageDisplay": format_one_decimal(average),
        "recoveryCount": calc::recovery_count(&stats),
        "gradeCount": grades.len(),
        "distribution": calc::histogram(grades.iter().map(|g| g.value), &calc::GRADE_BANDS),
        "students": rows,
    }))
}

fn handle_students_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let prefs = state.teacher()?.prefs.clone();
    let graded_only = optional_bool(&req.params, "gradedOnly")?.unwrap_or(false);
    let out_path = optional_str(&req.params, "outPath")?.map(PathBuf::from);
    let class_id = optional_str(&req.params, "classId")?;

    let repo = state.repo()?;
    let stats = match pages::resolve_class(repo, class_id, &prefs)? {
        Some(class) => pages::class_stats(repo, &class.id)?.0,
        None => Vec::new(),
    };
    let (csv, row_count) = export::students_csv(&stats, graded_only);

    match out_path {
        Some(path) => {
            export::write_csv(&path, &csv).map_err(|e| AppError::Io(format!("{e:#}")))?;
            info!(path = %path.to_string_lossy(), row_count, "csv exported");
            Ok(json!({ "path": path.to_string_lossy(), "rowCount": row_count }))
        }
        None => Ok(json!({ "csv": csv, "rowCount": row_count })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.model" => handle_dashboard_model(state, req),
        "reports.model" => handle_reports_model(state, req),
        "reportCard.get" => handle_report_card(state, req),
        "calc.classStats" => handle_class_stats(state, req),
        "exports.studentsCsv" => handle_students_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
