use crate::model::{
    now_timestamp, ClassGroup, ClassPatch, Grade, NewGrade, NewStudent, Profile, ProfilePatch,
    Role, Student, StudentPatch,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record not found: {id}")]
    NotFound { collection: &'static str, id: String },
    #[error("constraint violation on {collection}: {message}")]
    Constraint {
        collection: &'static str,
        message: String,
    },
    #[error("store request failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn from_sqlite(collection: &'static str, e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
                StoreError::Constraint {
                    collection,
                    message: e.to_string(),
                }
            }
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StudentFilter {
    All,
    InClass(String),
    Unassigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GradeFilter {
    All,
    Class(String),
    Student(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub grades_deleted: usize,
}

/// Failure of the grades-then-student delete. `partial` is set when grades were
/// already removed but the student row survived.
#[derive(Debug, Error)]
#[error("student delete failed after removing {grades_deleted} grade(s): {source}")]
pub struct CascadeError {
    pub grades_deleted: usize,
    pub partial: bool,
    #[source]
    pub source: StoreError,
}

/// The collections API of the backing store: filtered and ordered lists,
/// insert-returning, update-by-id and delete-by-id.
pub trait RecordStore {
    fn list_classes(&self) -> Result<Vec<ClassGroup>, StoreError>;
    fn insert_class(&self, name: &str) -> Result<ClassGroup, StoreError>;
    fn update_class(&self, id: &str, patch: &ClassPatch) -> Result<(), StoreError>;
    fn delete_class(&self, id: &str) -> Result<(), StoreError>;

    fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError>;
    fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError>;
    fn find_student_by_enrollment_code(&self, code: &str) -> Result<Option<Student>, StoreError>;
    fn insert_student(&self, new: &NewStudent) -> Result<Student, StoreError>;
    fn update_student(&self, id: &str, patch: &StudentPatch) -> Result<(), StoreError>;
    fn delete_student(&self, id: &str) -> Result<(), StoreError>;

    fn list_grades(&self, filter: &GradeFilter, order: DateOrder)
        -> Result<Vec<Grade>, StoreError>;
    fn insert_grade(&self, new: &NewGrade) -> Result<Grade, StoreError>;
    fn delete_grade(&self, id: &str) -> Result<(), StoreError>;
    fn delete_grades_by_student(&self, student_id: &str) -> Result<usize, StoreError>;

    fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;
    fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;
    fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), StoreError>;

    fn insert_grades(&self, new: &[NewGrade]) -> Result<Vec<Grade>, StoreError> {
        new.iter().map(|g| self.insert_grade(g)).collect()
    }

    /// Deletes every grade of the student, then the student. Stores that can
    /// group both steps atomically should override this.
    fn delete_student_cascade(&self, id: &str) -> Result<CascadeOutcome, CascadeError> {
        delete_student_two_step(self, id)
    }
}

/// Two independent requests with no atomicity. If the second one fails the
/// grades stay deleted while the student remains; the error says so.
pub fn delete_student_two_step<S: RecordStore + ?Sized>(
    store: &S,
    id: &str,
) -> Result<CascadeOutcome, CascadeError> {
    let grades_deleted = store
        .delete_grades_by_student(id)
        .map_err(|source| CascadeError {
            grades_deleted: 0,
            partial: false,
            source,
        })?;
    store.delete_student(id).map_err(|source| CascadeError {
        grades_deleted,
        partial: grades_deleted > 0,
        source,
    })?;
    Ok(CascadeOutcome { grades_deleted })
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Self {
        Self::new(crate::db::open_in_memory().expect("in-memory workspace"))
    }
}

fn expect_one(collection: &'static str, id: &str, changed: usize) -> Result<(), StoreError> {
    if changed == 0 {
        return Err(StoreError::NotFound {
            collection,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        enrollment_code: r.get(2)?,
        class_id: r.get(3)?,
        created_at: r.get(4)?,
    })
}

fn grade_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        value: r.get(3)?,
        evaluated_on: r.get(4)?,
        kind: r.get(5)?,
        created_at: r.get(6)?,
    })
}

fn profile_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let role_raw: String = r.get(2)?;
    // Unknown roles degrade to student: they must never reach management views.
    let role = Role::parse(&role_raw).unwrap_or(Role::Student);
    Ok(Profile {
        id: r.get(0)?,
        display_name: r.get(1)?,
        role,
        student_id: r.get(3)?,
        created_at: r.get(4)?,
    })
}

const STUDENT_COLUMNS: &str = "id, name, enrollment_code, class_id, created_at";
const GRADE_COLUMNS: &str = "id, student_id, class_id, value, evaluated_on, kind, created_at";

fn delete_grades_by_student_on(conn: &Connection, student_id: &str) -> Result<usize, StoreError> {
    conn.execute("DELETE FROM grades WHERE student_id = ?", [student_id])
        .map_err(|e| StoreError::from_sqlite("grades", e))
}

fn delete_student_on(conn: &Connection, id: &str) -> Result<(), StoreError> {
    let changed = conn
        .execute("DELETE FROM students WHERE id = ?", [id])
        .map_err(|e| StoreError::from_sqlite("students", e))?;
    expect_one("students", id, changed)
}

impl RecordStore for SqliteStore {
    fn list_classes(&self) -> Result<Vec<ClassGroup>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM classes ORDER BY name, rowid")
            .map_err(|e| StoreError::from_sqlite("classes", e))?;
        stmt.query_map([], |r| {
            Ok(ClassGroup {
                id: r.get(0)?,
                name: r.get(1)?,
                created_at: r.get(2)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| StoreError::from_sqlite("classes", e))
    }

    fn insert_class(&self, name: &str) -> Result<ClassGroup, StoreError> {
        let class = ClassGroup {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now_timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO classes(id, name, created_at) VALUES(?, ?, ?)",
                (&class.id, &class.name, &class.created_at),
            )
            .map_err(|e| StoreError::from_sqlite("classes", e))?;
        Ok(class)
    }

    fn update_class(&self, id: &str, patch: &ClassPatch) -> Result<(), StoreError> {
        let Some(name) = patch.name.as_deref() else {
            return Ok(());
        };
        let changed = self
            .conn
            .execute("UPDATE classes SET name = ? WHERE id = ?", (name, id))
            .map_err(|e| StoreError::from_sqlite("classes", e))?;
        expect_one("classes", id, changed)
    }

    fn delete_class(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM classes WHERE id = ?", [id])
            .map_err(|e| StoreError::from_sqlite("classes", e))?;
        expect_one("classes", id, changed)
    }

    fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        let (clause, binds): (&str, Vec<Value>) = match filter {
            StudentFilter::All => ("", Vec::new()),
            StudentFilter::InClass(class_id) => {
                ("WHERE class_id = ?", vec![Value::Text(class_id.clone())])
            }
            StudentFilter::Unassigned => ("WHERE class_id IS NULL", Vec::new()),
        };
        let sql = format!(
            "SELECT {} FROM students {} ORDER BY name, rowid",
            STUDENT_COLUMNS, clause
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::from_sqlite("students", e))?;
        stmt.query_map(params_from_iter(binds), student_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(|e| StoreError::from_sqlite("students", e))
    }

    fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
                [id],
                student_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite("students", e))
    }

    fn find_student_by_enrollment_code(&self, code: &str) -> Result<Option<Student>, StoreError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM students WHERE enrollment_code = ? ORDER BY rowid LIMIT 1",
                    STUDENT_COLUMNS
                ),
                [code],
                student_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite("students", e))
    }

    fn insert_student(&self, new: &NewStudent) -> Result<Student, StoreError> {
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: new.name.clone(),
            enrollment_code: new.enrollment_code.clone(),
            class_id: new.class_id.clone(),
            created_at: now_timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO students(id, name, enrollment_code, class_id, created_at)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &student.id,
                    &student.name,
                    &student.enrollment_code,
                    &student.class_id,
                    &student.created_at,
                ),
            )
            .map_err(|e| StoreError::from_sqlite("students", e))?;
        Ok(student)
    }

    fn update_student(&self, id: &str, patch: &StudentPatch) -> Result<(), StoreError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(name) = &patch.name {
            sets.push("name = ?");
            binds.push(Value::Text(name.clone()));
        }
        if let Some(code) = &patch.enrollment_code {
            sets.push("enrollment_code = ?");
            binds.push(code.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if let Some(class_id) = &patch.class_id {
            sets.push("class_id = ?");
            binds.push(class_id.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if sets.is_empty() {
            return Ok(());
        }
        binds.push(Value::Text(id.to_string()));
        let sql = format!("UPDATE students SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds))
            .map_err(|e| StoreError::from_sqlite("students", e))?;
        expect_one("students", id, changed)
    }

    fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        delete_student_on(&self.conn, id)
    }

    fn list_grades(
        &self,
        filter: &GradeFilter,
        order: DateOrder,
    ) -> Result<Vec<Grade>, StoreError> {
        let (clause, binds): (&str, Vec<Value>) = match filter {
            GradeFilter::All => ("", Vec::new()),
            GradeFilter::Class(class_id) => {
                ("WHERE class_id = ?", vec![Value::Text(class_id.clone())])
            }
            GradeFilter::Student(student_id) => {
                ("WHERE student_id = ?", vec![Value::Text(student_id.clone())])
            }
        };
        let direction = match order {
            DateOrder::Ascending => "ASC",
            DateOrder::Descending => "DESC",
        };
        let sql = format!(
            "SELECT {} FROM grades {} ORDER BY evaluated_on {dir}, rowid {dir}",
            GRADE_COLUMNS,
            clause,
            dir = direction
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::from_sqlite("grades", e))?;
        stmt.query_map(params_from_iter(binds), grade_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(|e| StoreError::from_sqlite("grades", e))
    }

    fn insert_grade(&self, new: &NewGrade) -> Result<Grade, StoreError> {
        let grade = Grade {
            id: Uuid::new_v4().to_string(),
            student_id: new.student_id.clone(),
            class_id: new.class_id.clone(),
            value: new.value,
            evaluated_on: new.evaluated_on.clone(),
            kind: new.kind.clone(),
            created_at: now_timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO grades(id, student_id, class_id, value, evaluated_on, kind, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &grade.id,
                    &grade.student_id,
                    &grade.class_id,
                    grade.value,
                    &grade.evaluated_on,
                    &grade.kind,
                    &grade.created_at,
                ),
            )
            .map_err(|e| StoreError::from_sqlite("grades", e))?;
        Ok(grade)
    }

    fn insert_grades(&self, new: &[NewGrade]) -> Result<Vec<Grade>, StoreError> {
        // A bulk insert is one request against the store: all rows or none.
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::from_sqlite("grades", e))?;
        let mut out = Vec::with_capacity(new.len());
        for g in new {
            out.push(self.insert_grade(g)?);
        }
        tx.commit()
            .map_err(|e| StoreError::from_sqlite("grades", e))?;
        Ok(out)
    }

    fn delete_grade(&self, id: &str) -> Result<(), StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM grades WHERE id = ?", [id])
            .map_err(|e| StoreError::from_sqlite("grades", e))?;
        expect_one("grades", id, changed)
    }

    fn delete_grades_by_student(&self, student_id: &str) -> Result<usize, StoreError> {
        delete_grades_by_student_on(&self.conn, student_id)
    }

    fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, display_name, role, student_id, created_at FROM profiles WHERE id = ?",
                [id],
                profile_from_row,
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite("profiles", e))
    }

    fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO profiles(id, display_name, role, student_id, created_at)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &profile.id,
                    &profile.display_name,
                    profile.role.as_str(),
                    &profile.student_id,
                    &profile.created_at,
                ),
            )
            .map_err(|e| StoreError::from_sqlite("profiles", e))?;
        Ok(())
    }

    fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(name) = &patch.display_name {
            sets.push("display_name = ?");
            binds.push(Value::Text(name.clone()));
        }
        if let Some(student_id) = &patch.student_id {
            sets.push("student_id = ?");
            binds.push(student_id.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if sets.is_empty() {
            return Ok(());
        }
        binds.push(Value::Text(id.to_string()));
        let sql = format!("UPDATE profiles SET {} WHERE id = ?", sets.join(", "));
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds))
            .map_err(|e| StoreError::from_sqlite("profiles", e))?;
        expect_one("profiles", id, changed)
    }

    fn delete_student_cascade(&self, id: &str) -> Result<CascadeOutcome, CascadeError> {
        let tx = self.conn.unchecked_transaction().map_err(|e| CascadeError {
            grades_deleted: 0,
            partial: false,
            source: StoreError::from_sqlite("students", e),
        })?;
        let grades_deleted = delete_grades_by_student_on(&tx, id).map_err(|source| CascadeError {
            grades_deleted: 0,
            partial: false,
            source,
        })?;
        // Dropping the transaction on error rolls the grade deletion back.
        delete_student_on(&tx, id).map_err(|source| CascadeError {
            grades_deleted: 0,
            partial: false,
            source,
        })?;
        tx.commit().map_err(|e| CascadeError {
            grades_deleted: 0,
            partial: false,
            source: StoreError::from_sqlite("students", e),
        })?;
        Ok(CascadeOutcome { grades_deleted })
    }
}
