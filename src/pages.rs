use crate::calc::{
    self, class_average, evolution_series, format_one_decimal, histogram, per_student_stats,
    ranking, recovery_count, status_of, BandCount, EvolutionPoint, RankEntry, ReportCard, Status,
    StatusFilter, StudentStats, EVOLUTION_STUDENTS, GRADE_BANDS,
};
use crate::error::AppError;
use crate::model::{ClassGroup, Grade, Student};
use crate::repo::Repository;
use crate::session::SessionPrefs;
use crate::store::{DateOrder, GradeFilter, RecordStore, StoreError, StudentFilter};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct RowFilters {
    pub search: String,
    pub status: StatusFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub enrollment_code: Option<String>,
    pub average: f64,
    pub average_display: String,
    pub count: usize,
    pub latest: Option<f64>,
    pub status: Status,
}

impl From<&StudentStats> for StudentRow {
    fn from(s: &StudentStats) -> Self {
        StudentRow {
            id: s.student.id.clone(),
            name: s.student.name.clone(),
            enrollment_code: s.student.enrollment_code.clone(),
            average: s.average,
            average_display: if s.count > 0 {
                format_one_decimal(s.average)
            } else {
                "-".to_string()
            },
            count: s.count,
            latest: s.latest,
            status: status_of(s.average, s.count),
        }
    }
}

fn filtered_rows(stats: &[StudentStats], filters: &RowFilters) -> Vec<StudentRow> {
    stats
        .iter()
        .filter(|s| calc::name_matches(&s.student.name, &filters.search))
        .map(StudentRow::from)
        .filter(|r| filters.status.accepts(r.status))
        .collect()
}

/// An explicit class id wins; otherwise the session's effective class.
pub fn resolve_class<S: RecordStore>(
    repo: &mut Repository<S>,
    requested: Option<&str>,
    prefs: &SessionPrefs,
) -> Result<Option<ClassGroup>, AppError> {
    let classes = repo.classes()?;
    match requested {
        Some(id) => classes
            .into_iter()
            .find(|c| c.id == id)
            .map(Some)
            .ok_or_else(|| {
                AppError::Store(StoreError::NotFound {
                    collection: "classes",
                    id: id.to_string(),
                })
            }),
        None => Ok(prefs.effective_class(&classes).cloned()),
    }
}

/// Students and grades of a class, with per-student stats in list order.
pub fn class_stats<S: RecordStore>(
    repo: &mut Repository<S>,
    class_id: &str,
) -> Result<(Vec<StudentStats>, Vec<Grade>), AppError> {
    let students = repo.students(StudentFilter::InClass(class_id.to_string()))?;
    let grades = repo.grades(GradeFilter::Class(class_id.to_string()), DateOrder::Descending)?;
    Ok((per_student_stats(&students, &grades), grades))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardModel {
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub total_students: usize,
    pub class_average: f64,
    pub class_average_display: String,
    pub recovery_count: usize,
    pub distribution: Vec<BandCount>,
    pub evolution: Vec<EvolutionPoint>,
    pub rows: Vec<StudentRow>,
}

pub fn dashboard<S: RecordStore>(
    repo: &mut Repository<S>,
    class_id: Option<&str>,
    prefs: &SessionPrefs,
    filters: &RowFilters,
) -> Result<DashboardModel, AppError> {
    let Some(class) = resolve_class(repo, class_id, prefs)? else {
        return Ok(DashboardModel {
            class_id: None,
            class_name: None,
            total_students: 0,
            class_average: 0.0,
            class_average_display: format_one_decimal(0.0),
            recovery_count: 0,
            distribution: histogram(std::iter::empty(), &GRADE_BANDS),
            evolution: Vec::new(),
            rows: Vec::new(),
        });
    };
    let (stats, grades) = class_stats(repo, &class.id)?;
    let avg = class_average(&stats);
    Ok(DashboardModel {
        class_id: Some(class.id),
        class_name: Some(class.name),
        total_students: stats.len(),
        class_average: avg,
        class_average_display: format_one_decimal(avg),
        recovery_count: recovery_count(&stats),
        distribution: histogram(grades.iter().map(|g| g.value), &GRADE_BANDS),
        evolution: evolution_series(&stats, &grades, EVOLUTION_STUDENTS),
        rows: filtered_rows(&stats, filters),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentsOverview {
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub rows: Vec<StudentRow>,
    pub unassigned: Vec<Student>,
}

pub fn students_overview<S: RecordStore>(
    repo: &mut Repository<S>,
    class_id: Option<&str>,
    prefs: &SessionPrefs,
    filters: &RowFilters,
) -> Result<StudentsOverview, AppError> {
    let unassigned = repo.students(StudentFilter::Unassigned)?;
    let Some(class) = resolve_class(repo, class_id, prefs)? else {
        return Ok(StudentsOverview {
            class_id: None,
            class_name: None,
            rows: Vec::new(),
            unassigned,
        });
    };
    let (stats, _) = class_stats(repo, &class.id)?;
    Ok(StudentsOverview {
        class_id: Some(class.id),
        class_name: Some(class.name),
        rows: filtered_rows(&stats, filters),
        unassigned,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsModel {
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub class_average: f64,
    pub distribution: Vec<BandCount>,
    pub ranking: Vec<RankEntry>,
}

pub fn reports<S: RecordStore>(
    repo: &mut Repository<S>,
    class_id: Option<&str>,
    prefs: &SessionPrefs,
) -> Result<ReportsModel, AppError> {
    let Some(class) = resolve_class(repo, class_id, prefs)? else {
        return Ok(ReportsModel {
            class_id: None,
            class_name: None,
            class_average: 0.0,
            distribution: histogram(std::iter::empty(), &GRADE_BANDS),
            ranking: Vec::new(),
        });
    };
    let (stats, grades) = class_stats(repo, &class.id)?;
    Ok(ReportsModel {
        class_id: Some(class.id),
        class_name: Some(class.name),
        class_average: class_average(&stats),
        distribution: histogram(grades.iter().map(|g| g.value), &GRADE_BANDS),
        ranking: ranking(&stats),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCardModel {
    pub student: Student,
    pub average_display: String,
    #[serde(flatten)]
    pub card: ReportCard,
}

pub fn report_card<S: RecordStore>(
    repo: &mut Repository<S>,
    student_id: &str,
) -> Result<ReportCardModel, AppError> {
    let student = repo.student(student_id)?;
    let grades = repo.grades(
        GradeFilter::Student(student_id.to_string()),
        DateOrder::Ascending,
    )?;
    let card = calc::report_card(&grades);
    Ok(ReportCardModel {
        student,
        average_display: format_one_decimal(card.average),
        card,
    })
}

/// Every grade of the student, newest first.
pub fn student_history<S: RecordStore>(
    repo: &mut Repository<S>,
    student_id: &str,
) -> Result<Vec<Grade>, AppError> {
    repo.student(student_id)?;
    repo.grades(
        GradeFilter::Student(student_id.to_string()),
        DateOrder::Descending,
    )
}
