use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub enrollment_code: Option<String>,
    /// `None` means the student is not assigned to any class yet.
    pub class_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    /// Denormalized copy of the class the grade was recorded in.
    pub class_id: String,
    pub value: f64,
    /// Calendar date, `YYYY-MM-DD`.
    pub evaluated_on: String,
    pub kind: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Accepts the stored spellings, including the legacy synonyms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" | "professor" => Some(Self::Teacher),
            "student" | "aluno" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub student_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub name: String,
    pub enrollment_code: Option<String>,
    pub class_id: Option<String>,
}

/// Absent fields are left untouched. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub enrollment_code: Option<Option<String>>,
    pub class_id: Option<Option<String>>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.enrollment_code.is_none() && self.class_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewGrade {
    pub student_id: String,
    pub class_id: String,
    pub value: f64,
    pub evaluated_on: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub student_id: Option<Option<String>>,
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
