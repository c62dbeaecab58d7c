use crate::cache::{CacheStats, Cacheable, Collection, QueryCache, QueryKey};
use crate::error::AppError;
use crate::model::{
    ClassGroup, ClassPatch, Grade, NewGrade, NewStudent, Profile, ProfilePatch, Student,
    StudentPatch,
};
use crate::store::{
    CascadeOutcome, DateOrder, GradeFilter, RecordStore, StoreError, StudentFilter,
};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 10.0;

fn required_name(raw: &str, what: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", what)));
    }
    Ok(name.to_string())
}

fn optional_code(raw: Option<String>) -> Option<String> {
    raw.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

pub fn validate_grade(new: &NewGrade) -> Result<(), AppError> {
    if !new.value.is_finite() || !(GRADE_MIN..=GRADE_MAX).contains(&new.value) {
        return Err(AppError::Validation(format!(
            "grade value must be between {} and {}",
            GRADE_MIN, GRADE_MAX
        )));
    }
    if NaiveDate::parse_from_str(&new.evaluated_on, "%Y-%m-%d").is_err() {
        return Err(AppError::Validation(
            "evaluation date must be YYYY-MM-DD".into(),
        ));
    }
    if new.kind.trim().is_empty() {
        return Err(AppError::Validation("grade kind must not be empty".into()));
    }
    if new.student_id.trim().is_empty() || new.class_id.trim().is_empty() {
        return Err(AppError::Validation(
            "grade needs a student and a class".into(),
        ));
    }
    Ok(())
}

/// Store access with a list cache in front. Reads are served from the cache
/// when possible and every successful write drops the lists it affects.
pub struct Repository<S: RecordStore> {
    store: S,
    cache: QueryCache,
}

impl<S: RecordStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: QueryCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn invalidate(&mut self, collections: &[Collection]) {
        for c in collections {
            let dropped = self.cache.invalidate(*c);
            debug!(collection = ?c, dropped, "cache invalidated");
        }
    }

    fn cached<T: Cacheable>(
        &mut self,
        key: QueryKey,
        fetch: impl FnOnce(&S) -> Result<Vec<T>, StoreError>,
    ) -> Result<Vec<T>, AppError> {
        if let Some(hit) = self.cache.get::<T>(&key) {
            return Ok(hit);
        }
        let fresh = fetch(&self.store)?;
        self.cache.put(key, fresh.clone());
        Ok(fresh)
    }

    pub fn classes(&mut self) -> Result<Vec<ClassGroup>, AppError> {
        self.cached(QueryKey::Classes, |s| s.list_classes())
    }

    pub fn create_class(&mut self, name: &str) -> Result<ClassGroup, AppError> {
        let name = required_name(name, "class name")?;
        let class = self.store.insert_class(&name)?;
        self.invalidate(&[Collection::Classes]);
        info!(class_id = %class.id, "class created");
        Ok(class)
    }

    pub fn rename_class(&mut self, id: &str, name: &str) -> Result<(), AppError> {
        let name = required_name(name, "class name")?;
        self.store
            .update_class(id, &ClassPatch { name: Some(name) })?;
        self.invalidate(&[Collection::Classes]);
        Ok(())
    }

    pub fn delete_class(&mut self, id: &str) -> Result<(), AppError> {
        self.store.delete_class(id)?;
        self.invalidate(&[Collection::Classes]);
        info!(class_id = %id, "class deleted");
        Ok(())
    }

    pub fn students(&mut self, filter: StudentFilter) -> Result<Vec<Student>, AppError> {
        let key = QueryKey::Students(filter.clone());
        self.cached(key, |s| s.list_students(&filter))
    }

    pub fn student(&self, id: &str) -> Result<Student, AppError> {
        self.store.get_student(id)?.ok_or_else(|| {
            AppError::Store(StoreError::NotFound {
                collection: "students",
                id: id.to_string(),
            })
        })
    }

    pub fn create_student(&mut self, new: NewStudent) -> Result<Student, AppError> {
        let new = NewStudent {
            name: required_name(&new.name, "student name")?,
            enrollment_code: optional_code(new.enrollment_code),
            class_id: new.class_id,
        };
        let student = self.store.insert_student(&new)?;
        self.invalidate(&[Collection::Students]);
        info!(student_id = %student.id, "student created");
        Ok(student)
    }

    pub fn update_student(&mut self, id: &str, patch: StudentPatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Err(AppError::BadParams("nothing to update".into()));
        }
        let patch = StudentPatch {
            name: match patch.name {
                Some(n) => Some(required_name(&n, "student name")?),
                None => None,
            },
            enrollment_code: patch.enrollment_code.map(optional_code),
            class_id: patch.class_id,
        };
        self.store.update_student(id, &patch)?;
        self.invalidate(&[Collection::Students]);
        Ok(())
    }

    /// `None` unassigns the student.
    pub fn assign_class(&mut self, id: &str, class_id: Option<String>) -> Result<(), AppError> {
        self.update_student(
            id,
            StudentPatch {
                class_id: Some(class_id),
                ..Default::default()
            },
        )
    }

    pub fn delete_student(&mut self, id: &str) -> Result<CascadeOutcome, AppError> {
        match self.store.delete_student_cascade(id) {
            Ok(outcome) => {
                self.invalidate(&[Collection::Students, Collection::Grades]);
                info!(student_id = %id, grades_deleted = outcome.grades_deleted, "student deleted");
                Ok(outcome)
            }
            Err(e) => {
                if e.partial {
                    // The grades are gone even though the student survived.
                    self.invalidate(&[Collection::Grades]);
                    warn!(student_id = %id, grades_deleted = e.grades_deleted, "student delete left partially applied");
                }
                Err(e.into())
            }
        }
    }

    pub fn grades(&mut self, filter: GradeFilter, order: DateOrder) -> Result<Vec<Grade>, AppError> {
        let key = QueryKey::Grades(filter.clone(), order);
        self.cached(key, |s| s.list_grades(&filter, order))
    }

    pub fn record_grade(&mut self, new: NewGrade) -> Result<Grade, AppError> {
        validate_grade(&new)?;
        let grade = self.store.insert_grade(&new)?;
        self.invalidate(&[Collection::Grades]);
        info!(grade_id = %grade.id, student_id = %grade.student_id, "grade recorded");
        Ok(grade)
    }

    pub fn record_grades(&mut self, new: Vec<NewGrade>) -> Result<Vec<Grade>, AppError> {
        for g in &new {
            validate_grade(g)?;
        }
        if new.is_empty() {
            return Ok(Vec::new());
        }
        let grades = self.store.insert_grades(&new)?;
        self.invalidate(&[Collection::Grades]);
        info!(count = grades.len(), "grades recorded");
        Ok(grades)
    }

    pub fn delete_grade(&mut self, id: &str) -> Result<(), AppError> {
        self.store.delete_grade(id)?;
        self.invalidate(&[Collection::Grades]);
        info!(grade_id = %id, "grade deleted");
        Ok(())
    }

    pub fn profile(&self, id: &str) -> Result<Profile, AppError> {
        self.store.get_profile(id)?.ok_or_else(|| {
            AppError::Store(StoreError::NotFound {
                collection: "profiles",
                id: id.to_string(),
            })
        })
    }

    pub fn link_profile_student(
        &mut self,
        profile_id: &str,
        student_id: Option<String>,
    ) -> Result<Profile, AppError> {
        if let Some(sid) = student_id.as_deref() {
            self.student(sid)?;
        }
        self.store.update_profile(
            profile_id,
            &ProfilePatch {
                display_name: None,
                student_id: Some(student_id),
            },
        )?;
        self.profile(profile_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn repo() -> Repository<SqliteStore> {
        Repository::new(SqliteStore::open_in_memory())
    }

    fn grade(student: &Student, class: &ClassGroup, value: f64, date: &str) -> NewGrade {
        NewGrade {
            student_id: student.id.clone(),
            class_id: class.id.clone(),
            value,
            evaluated_on: date.into(),
            kind: "exam".into(),
        }
    }

    fn seed(repo: &mut Repository<SqliteStore>) -> (ClassGroup, Student) {
        let class = repo.create_class("9A").expect("class");
        let student = repo
            .create_student(NewStudent {
                name: " Ana Silva ".into(),
                enrollment_code: Some("  ".into()),
                class_id: Some(class.id.clone()),
            })
            .expect("student");
        (class, student)
    }

    #[test]
    fn create_student_trims_and_drops_blank_code() {
        let mut repo = repo();
        let (_, student) = seed(&mut repo);
        assert_eq!(student.name, "Ana Silva");
        assert_eq!(student.enrollment_code, None);
    }

    #[test]
    fn blank_names_never_reach_the_store() {
        let mut repo = repo();
        assert!(matches!(
            repo.create_class("   "),
            Err(AppError::Validation(_))
        ));
        assert!(repo.classes().expect("list").is_empty());
    }

    #[test]
    fn grade_validation_rejects_bad_values_and_dates() {
        let mut repo = repo();
        let (class, student) = seed(&mut repo);
        for (value, date) in [
            (10.5, "2026-03-01"),
            (-0.1, "2026-03-01"),
            (f64::NAN, "2026-03-01"),
            (7.0, "2026-02-30"),
            (7.0, "01/03/2026"),
        ] {
            let err = repo
                .record_grade(grade(&student, &class, value, date))
                .expect_err("invalid grade");
            assert_eq!(err.code(), "validation_failed");
        }
        assert!(repo.record_grade(grade(&student, &class, 10.0, "2026-03-01")).is_ok());
        assert!(repo.record_grade(grade(&student, &class, 0.0, "2026-03-02")).is_ok());
    }

    #[test]
    fn reads_hit_the_cache_until_a_mutation_invalidates() {
        let mut repo = repo();
        let (class, student) = seed(&mut repo);
        let filter = GradeFilter::Class(class.id.clone());

        assert!(repo.grades(filter.clone(), DateOrder::Ascending).expect("g").is_empty());
        assert!(repo.grades(filter.clone(), DateOrder::Ascending).expect("g").is_empty());
        assert_eq!(repo.cache_stats().hits, 1);

        repo.record_grade(grade(&student, &class, 8.0, "2026-03-01"))
            .expect("grade");
        let after = repo.grades(filter, DateOrder::Ascending).expect("g");
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn failed_mutation_keeps_cache_entries() {
        let mut repo = repo();
        let (class, _) = seed(&mut repo);
        repo.classes().expect("warm");
        let before = repo.cache_stats();

        assert!(repo.delete_class(&class.id).is_err());
        let after = repo.cache_stats();
        assert_eq!(after.entries, before.entries);
        assert_eq!(after.invalidations, before.invalidations);
    }

    #[test]
    fn delete_student_refreshes_students_and_grades() {
        let mut repo = repo();
        let (class, student) = seed(&mut repo);
        repo.record_grade(grade(&student, &class, 5.0, "2026-03-01"))
            .expect("grade");
        assert_eq!(repo.students(StudentFilter::All).expect("s").len(), 1);
        assert_eq!(
            repo.grades(GradeFilter::All, DateOrder::Descending).expect("g").len(),
            1
        );

        let outcome = repo.delete_student(&student.id).expect("delete");
        assert_eq!(outcome.grades_deleted, 1);
        assert!(repo.students(StudentFilter::All).expect("s").is_empty());
        assert!(repo
            .grades(GradeFilter::All, DateOrder::Descending)
            .expect("g")
            .is_empty());
    }

    #[test]
    fn assign_and_unassign_class() {
        let mut repo = repo();
        let (class, student) = seed(&mut repo);
        repo.assign_class(&student.id, None).expect("unassign");
        assert_eq!(repo.students(StudentFilter::Unassigned).expect("s").len(), 1);
        repo.assign_class(&student.id, Some(class.id.clone()))
            .expect("assign");
        assert!(repo.students(StudentFilter::Unassigned).expect("s").is_empty());
        assert!(matches!(
            repo.assign_class(&student.id, Some("nope".into())),
            Err(AppError::Store(StoreError::Constraint { .. }))
        ));
    }

    #[test]
    fn bulk_grades_are_all_or_nothing_on_validation() {
        let mut repo = repo();
        let (class, student) = seed(&mut repo);
        let batch = vec![
            grade(&student, &class, 7.0, "2026-03-01"),
            grade(&student, &class, 11.0, "2026-03-02"),
        ];
        assert!(repo.record_grades(batch).is_err());
        assert!(repo
            .grades(GradeFilter::All, DateOrder::Ascending)
            .expect("g")
            .is_empty());
    }
}
