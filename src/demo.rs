use crate::calc::round_off_1_decimal;
use crate::error::AppError;
use crate::model::{NewGrade, NewStudent};
use crate::repo::Repository;
use crate::store::{RecordStore, StoreError};
use chrono::{Duration, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

pub const DEMO_NAMES: [&str; 10] = [
    "Ana Silva",
    "Bruno Costa",
    "Carla Dias",
    "Daniel Souza",
    "Elena Martins",
    "Felipe Lima",
    "Gabriela Rocha",
    "Hugo Santos",
    "Isabela Ferreira",
    "João Alves",
];

pub const DEMO_KINDS: [&str; 3] = ["exam", "assignment", "participation"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    pub students_created: usize,
    pub grades_created: usize,
    pub students_skipped: usize,
}

/// Fills a class with the demo roster and random grades. A seed makes the
/// values reproducible; dates are always relative to `today`.
pub fn generate<S: RecordStore>(
    repo: &mut Repository<S>,
    class_id: &str,
    seed: Option<u64>,
    today: NaiveDate,
) -> Result<DemoReport, AppError> {
    if !repo.classes()?.iter().any(|c| c.id == class_id) {
        return Err(AppError::Store(StoreError::NotFound {
            collection: "classes",
            id: class_id.to_string(),
        }));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut report = DemoReport::default();

    for name in DEMO_NAMES {
        let code: u32 = rng.gen_range(100_000..1_000_000);
        let student = match repo.create_student(NewStudent {
            name: name.to_string(),
            enrollment_code: Some(code.to_string()),
            class_id: Some(class_id.to_string()),
        }) {
            Ok(s) => s,
            Err(e) => {
                warn!(student = name, error = %e, "demo student skipped");
                report.students_skipped += 1;
                continue;
            }
        };
        report.students_created += 1;

        let n = rng.gen_range(3..=6);
        let batch: Vec<NewGrade> = (0..n)
            .map(|_| NewGrade {
                student_id: student.id.clone(),
                class_id: class_id.to_string(),
                value: round_off_1_decimal(rng.gen_range(0.0..=10.0)).min(10.0),
                evaluated_on: (today - Duration::days(rng.gen_range(0..90)))
                    .format("%Y-%m-%d")
                    .to_string(),
                kind: DEMO_KINDS[rng.gen_range(0..DEMO_KINDS.len())].to_string(),
            })
            .collect();
        report.grades_created += repo.record_grades(batch)?.len();
    }

    info!(
        class_id,
        students = report.students_created,
        grades = report.grades_created,
        "demo data generated"
    );
    Ok(report)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
