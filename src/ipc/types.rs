use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::AuthConfig;
use crate::error::AppError;
use crate::repo::Repository;
use crate::session::{ActiveSession, SessionState};
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub repo: Option<Repository<SqliteStore>>,
    pub session: SessionState,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            workspace: None,
            repo: None,
            session: SessionState::Anonymous,
            auth,
        }
    }

    pub fn repo(&mut self) -> Result<&mut Repository<SqliteStore>, AppError> {
        self.repo.as_mut().ok_or(AppError::NoWorkspace)
    }

    pub fn teacher(&self) -> Result<&ActiveSession, AppError> {
        Ok(self.session.require_teacher()?)
    }

    pub fn signed_in(&self) -> Result<&ActiveSession, AppError> {
        Ok(self.session.require_active()?)
    }
}
