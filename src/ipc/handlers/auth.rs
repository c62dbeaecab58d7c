use crate::auth::{self, SignUpRequest, StudentLink};
use crate::error::AppError;
use crate::ipc::error::respond;
use crate::ipc::params::{nullable_str, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::session::{Route, SessionState};
use crate::store::StudentFilter;
use serde_json::json;
use tracing::info;

fn session_json(state: &SessionState) -> serde_json::Value {
    match state.active() {
        Some(active) => json!({
            "authenticated": true,
            "profile": active.profile,
            "prefs": active.prefs,
            "home": Route::home_for(active.role()).path(),
        }),
        None => json!({ "authenticated": false, "home": Route::Login.path() }),
    }
}

fn handle_sign_up(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let p = &req.params;
    let role_raw = required_str(p, "role")?;
    let role = Role::parse(role_raw)
        .ok_or_else(|| AppError::BadParams(format!("unknown role: {}", role_raw)))?;
    let link = match (optional_str(p, "studentId")?, optional_str(p, "enrollmentCode")?) {
        (Some(id), _) => Some(StudentLink::StudentId(id.to_string())),
        (None, Some(code)) => Some(StudentLink::EnrollmentCode(code.to_string())),
        (None, None) => None,
    };
    let sign_up = SignUpRequest {
        email: required_str(p, "email")?.to_string(),
        password: required_str(p, "password")?.to_string(),
        display_name: required_str(p, "displayName")?.to_string(),
        role,
        link,
    };
    let cfg = state.auth.clone();
    let repo = state.repo()?;
    let outcome = auth::sign_up(repo.store(), &cfg, &sign_up)?;
    Ok(json!(outcome))
}

fn handle_sign_in(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let email = required_str(&req.params, "email")?;
    let password = required_str(&req.params, "password")?;
    let profile = auth::sign_in(state.repo()?.store(), email, password)?;
    info!(profile_id = %profile.id, role = %profile.role, "signed in");
    state.session = SessionState::begin(profile);
    Ok(session_json(&state.session))
}

fn handle_sign_out(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    state.session.end();
    Ok(session_json(&state.session))
}

fn handle_session(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, AppError> {
    Ok(session_json(&state.session))
}

fn handle_confirm_email(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    let email = required_str(&req.params, "email")?;
    auth::confirm_email(state.repo()?.store(), email)?;
    Ok(json!({ "confirmed": true }))
}

fn handle_provision(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let filter = match optional_str(&req.params, "classId")? {
        Some(id) => StudentFilter::InClass(id.to_string()),
        None => StudentFilter::All,
    };
    let cfg = state.auth.clone();
    let report = auth::provision_student_accounts(state.repo()?.store(), &cfg, &filter)?;
    info!(
        created = report.created.len(),
        failed = report.failed.len(),
        "student accounts provisioned"
    );
    Ok(json!(report))
}

fn handle_link_student(state: &mut AppState, req: &Request) -> Result<serde_json::Value, AppError> {
    state.teacher()?;
    let profile_id = required_str(&req.params, "profileId")?.to_string();
    let Some(student_id) = nullable_str(&req.params, "studentId")? else {
        return Err(AppError::BadParams("missing studentId".into()));
    };
    let profile = state.repo()?.link_profile_student(&profile_id, student_id)?;
    Ok(json!({ "profile": profile }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.signUp" => handle_sign_up(state, req),
        "auth.signIn" => handle_sign_in(state, req),
        "auth.signOut" => handle_sign_out(state, req),
        "auth.session" => handle_session(state, req),
        "auth.confirmEmail" => handle_confirm_email(state, req),
        "auth.provisionStudentAccounts" => handle_provision(state, req),
        "profiles.linkStudent" => handle_link_student(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
