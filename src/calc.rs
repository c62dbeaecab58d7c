use crate::model::{Grade, Student};
use serde::Serialize;
use std::collections::BTreeMap;

/// Average at or above which a student is approved. Display preferences may
/// show other thresholds but never change this one.
pub const PASS_THRESHOLD: f64 = 6.0;

/// Half-up rounding to one decimal: `floor(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn format_one_decimal(x: f64) -> String {
    format!("{:.1}", round_off_1_decimal(x))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student: Student,
    /// 0 when the student has no grades.
    pub average: f64,
    pub count: usize,
    /// Value of the most recently dated grade.
    pub latest: Option<f64>,
}

/// One entry per student, in input order.
pub fn per_student_stats(students: &[Student], grades: &[Grade]) -> Vec<StudentStats> {
    students
        .iter()
        .map(|s| {
            let mut sum = 0.0;
            let mut count = 0usize;
            let mut latest: Option<&Grade> = None;
            for g in grades.iter().filter(|g| g.student_id == s.id) {
                sum += g.value;
                count += 1;
                // Strictly greater: on a date tie the earlier input grade stays.
                if latest.map_or(true, |l| g.evaluated_on > l.evaluated_on) {
                    latest = Some(g);
                }
            }
            StudentStats {
                student: s.clone(),
                average: if count > 0 { sum / count as f64 } else { 0.0 },
                count,
                latest: latest.map(|g| g.value),
            }
        })
        .collect()
}

/// Mean of per-student averages. Students with no grades count as 0.
pub fn class_average(stats: &[StudentStats]) -> f64 {
    if stats.is_empty() {
        return 0.0;
    }
    stats.iter().map(|s| s.average).sum::<f64>() / stats.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeBand {
    pub label: &'static str,
    pub lo: f64,
    pub hi: f64,
    pub closed_top: bool,
}

impl GradeBand {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lo && (v < self.hi || (self.closed_top && v <= self.hi))
    }
}

pub const GRADE_BANDS: [GradeBand; 5] = [
    GradeBand {
        label: "A (9-10)",
        lo: 9.0,
        hi: 10.0,
        closed_top: true,
    },
    GradeBand {
        label: "B (7-8.9)",
        lo: 7.0,
        hi: 9.0,
        closed_top: false,
    },
    GradeBand {
        label: "C (5-6.9)",
        lo: 5.0,
        hi: 7.0,
        closed_top: false,
    },
    GradeBand {
        label: "D (3-4.9)",
        lo: 3.0,
        hi: 5.0,
        closed_top: false,
    },
    GradeBand {
        label: "F (0-2.9)",
        lo: 0.0,
        hi: 3.0,
        closed_top: false,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BandCount {
    pub name: &'static str,
    pub value: usize,
}

pub fn histogram<I>(values: I, bands: &[GradeBand]) -> Vec<BandCount>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts = vec![0usize; bands.len()];
    for v in values {
        if let Some(i) = bands.iter().position(|b| b.contains(v)) {
            counts[i] += 1;
        }
    }
    bands
        .iter()
        .zip(counts)
        .map(|(b, value)| BandCount {
            name: b.label,
            value,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub position: usize,
    #[serde(flatten)]
    pub stats: StudentStats,
}

/// Average descending; equal averages keep their input order.
pub fn sort_by_average_desc(stats: &mut [StudentStats]) {
    stats.sort_by(|a, b| b.average.total_cmp(&a.average));
}

pub fn ranking(stats: &[StudentStats]) -> Vec<RankEntry> {
    let mut graded: Vec<StudentStats> = stats.iter().filter(|s| s.count > 0).cloned().collect();
    sort_by_average_desc(&mut graded);
    graded
        .into_iter()
        .enumerate()
        .map(|(i, stats)| RankEntry {
            position: i + 1,
            stats,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Approved,
    Recovery,
    NoData,
}

pub fn status_of(average: f64, count: usize) -> Status {
    if count == 0 {
        Status::NoData
    } else if average >= PASS_THRESHOLD {
        Status::Approved
    } else {
        Status::Recovery
    }
}

pub fn recovery_count(stats: &[StudentStats]) -> usize {
    stats
        .iter()
        .filter(|s| status_of(s.average, s.count) == Status::Recovery)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Approved,
    Recovery,
}

impl StatusFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" | "todos" => Some(Self::All),
            "approved" | "aprovado" => Some(Self::Approved),
            "recovery" | "recuperacao" => Some(Self::Recovery),
            _ => None,
        }
    }

    pub fn accepts(self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Approved => status == Status::Approved,
            StatusFilter::Recovery => status == Status::Recovery,
        }
    }
}

/// Case-insensitive substring match; an empty query matches everything.
pub fn name_matches(name: &str, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    q.is_empty() || name.to_lowercase().contains(&q)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesValue {
    pub student_id: String,
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionPoint {
    pub date: String,
    pub values: Vec<SeriesValue>,
}

pub const EVOLUTION_STUDENTS: usize = 5;

/// Per-date values for the first `n` students, dates ascending.
pub fn evolution_series(stats: &[StudentStats], grades: &[Grade], n: usize) -> Vec<EvolutionPoint> {
    let mut by_date: BTreeMap<&str, Vec<SeriesValue>> = BTreeMap::new();
    for s in stats.iter().take(n) {
        let mut own: Vec<&Grade> = grades.iter().filter(|g| g.student_id == s.student.id).collect();
        own.sort_by(|a, b| a.evaluated_on.cmp(&b.evaluated_on));
        for g in own {
            let slot = by_date.entry(g.evaluated_on.as_str()).or_default();
            match slot.iter_mut().find(|v| v.student_id == s.student.id) {
                Some(existing) => existing.value = g.value,
                None => slot.push(SeriesValue {
                    student_id: s.student.id.clone(),
                    name: s.student.name.clone(),
                    value: g.value,
                }),
            }
        }
    }
    by_date
        .into_iter()
        .map(|(date, values)| EvolutionPoint {
            date: date.to_string(),
            values,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub average: f64,
    pub count: usize,
    pub status: Status,
    /// Oldest first, for the chart.
    pub history: Vec<Grade>,
    /// Newest first, for the table.
    pub recent: Vec<Grade>,
}

pub fn report_card(grades: &[Grade]) -> ReportCard {
    let mut history = grades.to_vec();
    history.sort_by(|a, b| a.evaluated_on.cmp(&b.evaluated_on));
    let mut recent = history.clone();
    recent.reverse();
    let count = history.len();
    let average = if count > 0 {
        history.iter().map(|g| g.value).sum::<f64>() / count as f64
    } else {
        0.0
    };
    ReportCard {
        average,
        count,
        status: status_of(average, count),
        history,
        recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, name: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            enrollment_code: None,
            class_id: Some("c1".into()),
            created_at: "2026-01-01".into(),
        }
    }

    fn grade(student_id: &str, value: f64, date: &str) -> Grade {
        Grade {
            id: format!("{}-{}-{}", student_id, date, value),
            student_id: student_id.into(),
            class_id: "c1".into(),
            value,
            evaluated_on: date.into(),
            kind: "exam".into(),
            created_at: "2026-01-01".into(),
        }
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_1_decimal(6.66666), 6.7);
        assert_eq!(round_off_1_decimal(6.25), 6.3);
        assert_eq!(format_one_decimal(20.0 / 3.0), "6.7");
        assert_eq!(format_one_decimal(0.0), "0.0");
    }

    #[test]
    fn average_of_4_6_10_is_approved() {
        let students = vec![student("s1", "Ana")];
        let grades = vec![
            grade("s1", 4.0, "2026-03-01"),
            grade("s1", 6.0, "2026-03-02"),
            grade("s1", 10.0, "2026-03-03"),
        ];
        let stats = per_student_stats(&students, &grades);
        assert_eq!(format_one_decimal(stats[0].average), "6.7");
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[0].latest, Some(10.0));
        assert_eq!(status_of(stats[0].average, stats[0].count), Status::Approved);
    }

    #[test]
    fn student_without_grades_has_zero_average_and_no_data() {
        let stats = per_student_stats(&[student("s1", "Ana")], &[]);
        assert_eq!(stats[0].average, 0.0);
        assert_eq!(stats[0].latest, None);
        assert_eq!(status_of(0.0, 0), Status::NoData);
        assert_eq!(recovery_count(&stats), 0);
    }

    #[test]
    fn latest_prefers_newest_date_then_input_order() {
        let students = vec![student("s1", "Ana")];
        let grades = vec![
            grade("s1", 7.0, "2026-03-05"),
            grade("s1", 3.0, "2026-03-05"),
            grade("s1", 9.0, "2026-03-01"),
        ];
        let stats = per_student_stats(&students, &grades);
        assert_eq!(stats[0].latest, Some(7.0));
    }

    #[test]
    fn class_average_counts_ungraded_students_as_zero() {
        assert_eq!(class_average(&[]), 0.0);
        let students = vec![student("s1", "Ana"), student("s2", "Bruno")];
        let grades = vec![grade("s1", 8.0, "2026-03-01")];
        let stats = per_student_stats(&students, &grades);
        assert_eq!(class_average(&stats), 4.0);
        assert_eq!(class_average(&stats[..1]), 8.0);
    }

    #[test]
    fn histogram_bands_are_disjoint_and_exhaustive() {
        let values = vec![0.0, 2.9, 2.95, 3.0, 4.99, 5.0, 6.9, 7.0, 8.95, 9.0, 10.0];
        let h = histogram(values.iter().copied(), &GRADE_BANDS);
        let by_name: Vec<(&str, usize)> = h.iter().map(|b| (b.name, b.value)).collect();
        assert_eq!(
            by_name,
            vec![
                ("A (9-10)", 2),
                ("B (7-8.9)", 2),
                ("C (5-6.9)", 2),
                ("D (3-4.9)", 2),
                ("F (0-2.9)", 3),
            ]
        );
        assert_eq!(h.iter().map(|b| b.value).sum::<usize>(), values.len());
    }

    #[test]
    fn histogram_ignores_out_of_range_values() {
        let h = histogram([10.5, -1.0], &GRADE_BANDS);
        assert!(h.iter().all(|b| b.value == 0));
    }

    #[test]
    fn ranking_is_stable_and_skips_ungraded() {
        let students = vec![
            student("s1", "Ana"),
            student("s2", "Bruno"),
            student("s3", "Carla"),
            student("s4", "Daniel"),
        ];
        let grades = vec![
            grade("s1", 7.0, "2026-03-01"),
            grade("s2", 9.0, "2026-03-01"),
            grade("s3", 7.0, "2026-03-01"),
        ];
        let stats = per_student_stats(&students, &grades);
        let ranked = ranking(&stats);
        let order: Vec<(usize, &str)> = ranked
            .iter()
            .map(|r| (r.position, r.stats.student.name.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "Bruno"), (2, "Ana"), (3, "Carla")]);
    }

    #[test]
    fn status_filter_excludes_no_data() {
        assert!(StatusFilter::All.accepts(Status::NoData));
        assert!(!StatusFilter::Approved.accepts(Status::NoData));
        assert!(!StatusFilter::Recovery.accepts(Status::NoData));
        assert!(StatusFilter::Recovery.accepts(status_of(5.99, 1)));
        assert_eq!(StatusFilter::parse("recuperacao"), Some(StatusFilter::Recovery));
    }

    #[test]
    fn name_search_is_case_insensitive() {
        assert!(name_matches("Ana Silva", "SIL"));
        assert!(name_matches("Ana Silva", ""));
        assert!(!name_matches("Ana Silva", "bruno"));
    }

    #[test]
    fn evolution_takes_first_students_and_last_grade_per_date() {
        let students: Vec<Student> = (1..=6)
            .map(|i| student(&format!("s{}", i), &format!("Student {}", i)))
            .collect();
        let mut grades: Vec<Grade> = (1..=6)
            .map(|i| grade(&format!("s{}", i), i as f64, "2026-03-02"))
            .collect();
        grades.push(grade("s1", 9.5, "2026-03-02"));
        grades.push(grade("s1", 5.0, "2026-03-01"));

        let stats = per_student_stats(&students, &grades);
        let series = evolution_series(&stats, &grades, EVOLUTION_STUDENTS);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, "2026-03-01");
        assert_eq!(series[1].values.len(), 5);
        let ana = series[1]
            .values
            .iter()
            .find(|v| v.student_id == "s1")
            .expect("s1 value");
        assert_eq!(ana.value, 9.5);
    }

    #[test]
    fn report_card_orders_history_both_ways() {
        let grades = vec![
            grade("s1", 5.0, "2026-03-02"),
            grade("s1", 4.0, "2026-03-01"),
            grade("s1", 6.0, "2026-03-03"),
        ];
        let card = report_card(&grades);
        assert_eq!(card.status, Status::Recovery);
        assert_eq!(card.history[0].evaluated_on, "2026-03-01");
        assert_eq!(card.recent[0].evaluated_on, "2026-03-03");
        assert_eq!(report_card(&[]).status, Status::NoData);
    }
}
