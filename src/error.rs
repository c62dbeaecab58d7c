use crate::auth::AuthError;
use crate::session::{AccessDenied, Route};
use crate::store::{CascadeError, StoreError};
use serde_json::{json, Value};
use thiserror::Error;

/// Where the shell should show an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Inline,
    Notification,
    Form,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Inline => "inline",
            Surface::Notification => "notification",
            Surface::Form => "form",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cascade(#[from] CascadeError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("sign in to continue")]
    Unauthenticated,
    #[error("this area is reserved for teachers")]
    Forbidden,
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("could not open workspace: {0}")]
    DbOpen(String),
    #[error("{0}")]
    Io(String),
}

impl From<AccessDenied> for AppError {
    fn from(d: AccessDenied) -> Self {
        match d {
            AccessDenied::Unauthenticated => AppError::Unauthenticated,
            AccessDenied::RequiresTeacher => AppError::Forbidden,
        }
    }
}

fn store_code(e: &StoreError) -> &'static str {
    match e {
        StoreError::NotFound { .. } => "not_found",
        StoreError::Constraint { .. } => "constraint_violation",
        StoreError::Backend(_) => "db_query_failed",
    }
}

fn store_details(e: &StoreError) -> Value {
    match e {
        StoreError::NotFound { collection, id } => json!({ "collection": collection, "id": id }),
        StoreError::Constraint { collection, .. } => json!({ "collection": collection }),
        StoreError::Backend(_) => json!({}),
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadParams(_) => "bad_params",
            AppError::Validation(_) => "validation_failed",
            AppError::Store(e) => store_code(e),
            AppError::Cascade(e) if e.partial => "partial_delete",
            AppError::Cascade(e) => store_code(&e.source),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::EmailNotConfirmed => "email_not_confirmed",
                AuthError::EmailTaken(_) => "email_taken",
                AuthError::Validation(_) => "validation_failed",
                AuthError::Store(s) => store_code(s),
            },
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NoWorkspace => "no_workspace",
            AppError::DbOpen(_) => "db_open_failed",
            AppError::Io(_) => "io_failed",
        }
    }

    pub fn surface(&self) -> Surface {
        match self {
            AppError::BadParams(_) | AppError::Validation(_) => Surface::Inline,
            AppError::Auth(AuthError::Store(_)) => Surface::Notification,
            AppError::Auth(_) | AppError::Unauthenticated => Surface::Form,
            _ => Surface::Notification,
        }
    }

    pub fn details(&self) -> Value {
        let mut details = match self {
            AppError::Store(e) | AppError::Auth(AuthError::Store(e)) => store_details(e),
            AppError::Cascade(e) => {
                let mut d = store_details(&e.source);
                d["gradesDeleted"] = json!(e.grades_deleted);
                d["partial"] = json!(e.partial);
                d
            }
            AppError::Forbidden => json!({ "redirect": Route::ReportCard.path() }),
            AppError::Unauthenticated => json!({ "redirect": Route::Login.path() }),
            _ => json!({}),
        };
        details["surface"] = json!(self.surface().as_str());
        details
    }
}
