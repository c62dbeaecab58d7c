use crate::model::{now_timestamp, Profile, Role};
use crate::store::{RecordStore, SqliteStore, StoreError, StudentFilter};
use rusqlite::OptionalExtension;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub require_email_confirmation: bool,
    pub student_email_domain: String,
    pub student_default_password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_email_confirmation: false,
            student_email_domain: "educonnect.com".to_string(),
            student_default_password: "123456".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("check your email to confirm the account before signing in")]
    EmailNotConfirmed,
    #[error("an account already exists for {0}")]
    EmailTaken(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub created_at: String,
}

/// Credential storage of the backing service.
pub trait AccountStore {
    fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError>;
    fn insert_account(&self, account: &Account) -> Result<(), StoreError>;
    fn confirm_account(&self, email: &str) -> Result<(), StoreError>;
}

impl AccountStore for SqliteStore {
    fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.conn()
            .query_row(
                "SELECT id, email, password_salt, password_hash, confirmed, created_at
                 FROM accounts WHERE email = ?",
                [email],
                |r| {
                    Ok(Account {
                        id: r.get(0)?,
                        email: r.get(1)?,
                        password_salt: r.get(2)?,
                        password_hash: r.get(3)?,
                        confirmed: r.get::<_, i64>(4)? != 0,
                        created_at: r.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite("accounts", e))
    }

    fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO accounts(id, email, password_salt, password_hash, confirmed, created_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    &account.id,
                    &account.email,
                    &account.password_salt,
                    &account.password_hash,
                    account.confirmed as i64,
                    &account.created_at,
                ),
            )
            .map_err(|e| StoreError::from_sqlite("accounts", e))?;
        Ok(())
    }

    fn confirm_account(&self, email: &str) -> Result<(), StoreError> {
        let changed = self
            .conn()
            .execute("UPDATE accounts SET confirmed = 1 WHERE email = ?", [email])
            .map_err(|e| StoreError::from_sqlite("accounts", e))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                collection: "accounts",
                id: email.to_string(),
            });
        }
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub enum StudentLink {
    StudentId(String),
    EnrollmentCode(String),
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    pub link: Option<StudentLink>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpOutcome {
    pub profile: Profile,
    pub confirmation_required: bool,
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AuthError::Validation("email must be a valid address".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must have at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn resolve_link<S: RecordStore>(
    store: &S,
    link: &StudentLink,
) -> Result<String, AuthError> {
    let found = match link {
        StudentLink::StudentId(id) => store.get_student(id)?,
        StudentLink::EnrollmentCode(code) => store.find_student_by_enrollment_code(code.trim())?,
    };
    found
        .map(|s| s.id)
        .ok_or_else(|| AuthError::Validation("linked student not found".into()))
}

pub fn sign_up<S: RecordStore + AccountStore>(
    store: &S,
    cfg: &AuthConfig,
    req: &SignUpRequest,
) -> Result<SignUpOutcome, AuthError> {
    let email = normalize_email(&req.email);
    validate_credentials(&email, &req.password)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(AuthError::Validation("display name is required".into()));
    }

    let student_id = match (&req.role, &req.link) {
        (Role::Student, Some(link)) => Some(resolve_link(store, link)?),
        (Role::Teacher, Some(_)) => {
            return Err(AuthError::Validation(
                "only student accounts can link to a student record".into(),
            ))
        }
        (_, None) => None,
    };

    if store.find_account(&email)?.is_some() {
        return Err(AuthError::EmailTaken(email));
    }

    let salt = Uuid::new_v4().simple().to_string();
    let account = Account {
        id: Uuid::new_v4().to_string(),
        password_hash: hash_password(&salt, &req.password),
        password_salt: salt,
        email,
        confirmed: !cfg.require_email_confirmation,
        created_at: now_timestamp(),
    };
    store.insert_account(&account)?;

    let profile = Profile {
        id: account.id.clone(),
        display_name: display_name.to_string(),
        role: req.role,
        student_id,
        created_at: account.created_at.clone(),
    };
    store.insert_profile(&profile)?;
    info!(profile_id = %profile.id, role = %profile.role, "account created");

    Ok(SignUpOutcome {
        profile,
        confirmation_required: !account.confirmed,
    })
}

pub fn sign_in<S: RecordStore + AccountStore>(
    store: &S,
    email: &str,
    password: &str,
) -> Result<Profile, AuthError> {
    let email = normalize_email(email);
    let Some(account) = store.find_account(&email)? else {
        return Err(AuthError::InvalidCredentials);
    };
    if hash_password(&account.password_salt, password) != account.password_hash {
        return Err(AuthError::InvalidCredentials);
    }
    if !account.confirmed {
        return Err(AuthError::EmailNotConfirmed);
    }
    store
        .get_profile(&account.id)?
        .ok_or(AuthError::InvalidCredentials)
}

pub fn confirm_email<S: AccountStore>(store: &S, email: &str) -> Result<(), AuthError> {
    store.confirm_account(&normalize_email(email))?;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub skipped_no_code: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub failed: Vec<ProvisionFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionFailure {
    pub student_id: String,
    pub message: String,
}

/// Creates a confirmed student account for every student with an enrollment
/// code, linked to that student record.
pub fn provision_student_accounts<S: RecordStore + AccountStore>(
    store: &S,
    cfg: &AuthConfig,
    filter: &StudentFilter,
) -> Result<ProvisionReport, AuthError> {
    let mut report = ProvisionReport::default();
    let students = store.list_students(filter)?;
    let confirmed_cfg = AuthConfig {
        require_email_confirmation: false,
        ..cfg.clone()
    };

    for student in students {
        let Some(code) = student
            .enrollment_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            report.skipped_no_code.push(student.id);
            continue;
        };
        let req = SignUpRequest {
            email: format!("{}@{}", code, cfg.student_email_domain),
            password: cfg.student_default_password.clone(),
            display_name: student.name.clone(),
            role: Role::Student,
            link: Some(StudentLink::StudentId(student.id.clone())),
        };
        match sign_up(store, &confirmed_cfg, &req) {
            Ok(outcome) => report.created.push(outcome.profile.id),
            Err(AuthError::EmailTaken(_)) => report.skipped_existing.push(student.id),
            Err(e) => {
                warn!(student_id = %student.id, error = %e, "student account provisioning failed");
                report.failed.push(ProvisionFailure {
                    student_id: student.id,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewStudent;

    fn teacher_signup(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.into(),
            password: "secret1".into(),
            display_name: "Prof. Lima".into(),
            role: Role::Teacher,
            link: None,
        }
    }

    #[test]
    fn hash_depends_on_salt() {
        assert_ne!(hash_password("a", "pw"), hash_password("b", "pw"));
        assert_eq!(hash_password("a", "pw"), hash_password("a", "pw"));
        assert_eq!(hash_password("a", "pw").len(), 64);
    }

    #[test]
    fn sign_up_then_sign_in_with_normalized_email() {
        let store = SqliteStore::open_in_memory();
        let cfg = AuthConfig::default();
        let out = sign_up(&store, &cfg, &teacher_signup("Prof@School.org ")).expect("sign up");
        assert!(!out.confirmation_required);

        let profile = sign_in(&store, "prof@school.org", "secret1").expect("sign in");
        assert_eq!(profile.role, Role::Teacher);
        assert_eq!(profile.display_name, "Prof. Lima");
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let store = SqliteStore::open_in_memory();
        sign_up(&store, &AuthConfig::default(), &teacher_signup("t@x.org")).expect("sign up");
        assert!(matches!(
            sign_in(&store, "t@x.org", "nope123"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            sign_in(&store, "ghost@x.org", "secret1"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn unconfirmed_accounts_cannot_sign_in_until_confirmed() {
        let store = SqliteStore::open_in_memory();
        let cfg = AuthConfig {
            require_email_confirmation: true,
            ..AuthConfig::default()
        };
        let out = sign_up(&store, &cfg, &teacher_signup("t@x.org")).expect("sign up");
        assert!(out.confirmation_required);
        assert!(matches!(
            sign_in(&store, "t@x.org", "secret1"),
            Err(AuthError::EmailNotConfirmed)
        ));
        confirm_email(&store, "T@x.org").expect("confirm");
        assert!(sign_in(&store, "t@x.org", "secret1").is_ok());
    }

    #[test]
    fn sign_up_validates_before_touching_the_store() {
        let store = SqliteStore::open_in_memory();
        let mut req = teacher_signup("t@x.org");
        req.password = "123".into();
        assert!(matches!(
            sign_up(&store, &AuthConfig::default(), &req),
            Err(AuthError::Validation(_))
        ));
        assert!(store.find_account("t@x.org").expect("find").is_none());

        let mut req = teacher_signup("t@x.org");
        req.display_name = "   ".into();
        assert!(matches!(
            sign_up(&store, &AuthConfig::default(), &req),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = SqliteStore::open_in_memory();
        sign_up(&store, &AuthConfig::default(), &teacher_signup("t@x.org")).expect("first");
        assert!(matches!(
            sign_up(&store, &AuthConfig::default(), &teacher_signup("t@x.org")),
            Err(AuthError::EmailTaken(_))
        ));
    }

    #[test]
    fn student_sign_up_links_by_enrollment_code() {
        let store = SqliteStore::open_in_memory();
        let student = store
            .insert_student(&NewStudent {
                name: "Ana Silva".into(),
                enrollment_code: Some("20248937".into()),
                class_id: None,
            })
            .expect("student");
        let out = sign_up(
            &store,
            &AuthConfig::default(),
            &SignUpRequest {
                email: "ana@x.org".into(),
                password: "secret1".into(),
                display_name: "Ana".into(),
                role: Role::Student,
                link: Some(StudentLink::EnrollmentCode("20248937".into())),
            },
        )
        .expect("sign up");
        assert_eq!(out.profile.student_id.as_deref(), Some(student.id.as_str()));

        let missing = sign_up(
            &store,
            &AuthConfig::default(),
            &SignUpRequest {
                email: "other@x.org".into(),
                password: "secret1".into(),
                display_name: "Other".into(),
                role: Role::Student,
                link: Some(StudentLink::EnrollmentCode("000".into())),
            },
        );
        assert!(matches!(missing, Err(AuthError::Validation(_))));
    }

    #[test]
    fn provisioning_skips_students_without_code_and_existing_accounts() {
        let store = SqliteStore::open_in_memory();
        let with_code = store
            .insert_student(&NewStudent {
                name: "Ana Silva".into(),
                enrollment_code: Some("20248937".into()),
                class_id: None,
            })
            .expect("student");
        store
            .insert_student(&NewStudent {
                name: "Sem Matricula".into(),
                ..Default::default()
            })
            .expect("student");

        let cfg = AuthConfig {
            require_email_confirmation: true,
            ..AuthConfig::default()
        };
        let first =
            provision_student_accounts(&store, &cfg, &StudentFilter::All).expect("provision");
        assert_eq!(first.created.len(), 1);
        assert_eq!(first.skipped_no_code.len(), 1);

        let profile = sign_in(&store, "20248937@educonnect.com", "123456").expect("sign in");
        assert_eq!(profile.student_id.as_deref(), Some(with_code.id.as_str()));

        let second =
            provision_student_accounts(&store, &cfg, &StudentFilter::All).expect("provision");
        assert!(second.created.is_empty());
        assert_eq!(second.skipped_existing, vec![with_code.id]);
    }
}
