use crate::model::{ClassGroup, Profile, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Route {
    Login,
    Index,
    Dashboard,
    Students,
    Reports,
    Settings,
    ReportCard,
    NotFound,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim().trim_end_matches('/');
        match trimmed {
            "" => Route::Index,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/alunos" | "/students" => Route::Students,
            "/relatorios" | "/reports" => Route::Reports,
            "/configuracoes" | "/settings" => Route::Settings,
            "/boletim" | "/report-card" => Route::ReportCard,
            _ => Route::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Index => "/",
            Route::Dashboard => "/dashboard",
            Route::Students => "/alunos",
            Route::Reports => "/relatorios",
            Route::Settings => "/configuracoes",
            Route::ReportCard => "/boletim",
            Route::NotFound => "/404",
        }
    }

    pub fn is_management(self) -> bool {
        matches!(
            self,
            Route::Dashboard | Route::Students | Route::Reports | Route::Settings
        )
    }

    pub fn home_for(role: Role) -> Self {
        match role {
            Role::Teacher => Route::Dashboard,
            Role::Student => Route::ReportCard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub route: Route,
    pub redirected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPrefs {
    pub dark_mode: bool,
    pub selected_class_id: Option<String>,
}

impl SessionPrefs {
    /// The class a page should show: the selected one if it still exists,
    /// otherwise the first class in list order.
    pub fn effective_class<'a>(&self, classes: &'a [ClassGroup]) -> Option<&'a ClassGroup> {
        self.selected_class_id
            .as_deref()
            .and_then(|id| classes.iter().find(|c| c.id == id))
            .or_else(|| classes.first())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub profile: Profile,
    pub prefs: SessionPrefs,
}

impl ActiveSession {
    pub fn role(&self) -> Role {
        self.profile.role
    }
}

/// Two authenticated states keyed on role, plus the unauthenticated entry
/// state. The role is fixed from sign-in until sign-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Active(ActiveSession),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    Unauthenticated,
    RequiresTeacher,
}

impl SessionState {
    pub fn begin(profile: Profile) -> Self {
        SessionState::Active(ActiveSession {
            profile,
            prefs: SessionPrefs::default(),
        })
    }

    pub fn end(&mut self) {
        *self = SessionState::Anonymous;
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Active(s) => Some(s),
            SessionState::Anonymous => None,
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveSession> {
        match self {
            SessionState::Active(s) => Some(s),
            SessionState::Anonymous => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.active().map(ActiveSession::role)
    }

    pub fn resolve(&self, requested: Route) -> Resolution {
        let route = match (self.role(), requested) {
            (_, Route::NotFound) => Route::NotFound,
            (None, _) => Route::Login,
            (Some(role), Route::Login | Route::Index) => Route::home_for(role),
            (Some(Role::Student), r) if r.is_management() => Route::ReportCard,
            (Some(_), r) => r,
        };
        Resolution {
            route,
            redirected: route != requested,
        }
    }

    pub fn require_active(&self) -> Result<&ActiveSession, AccessDenied> {
        self.active().ok_or(AccessDenied::Unauthenticated)
    }

    pub fn require_teacher(&self) -> Result<&ActiveSession, AccessDenied> {
        let active = self.require_active()?;
        match active.role() {
            Role::Teacher => Ok(active),
            Role::Student => Err(AccessDenied::RequiresTeacher),
        }
    }
}
