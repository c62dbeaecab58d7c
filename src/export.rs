use crate::calc::{format_one_decimal, sort_by_average_desc, StudentStats, PASS_THRESHOLD};
use anyhow::Context;
use std::path::Path;

pub const CSV_HEADER: &str = "Nome,Matrícula,Média,Status";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Status column of the export. Ungraded students have average 0 and so
/// export as "Recuperação".
fn export_status(average: f64) -> &'static str {
    if average >= PASS_THRESHOLD {
        "Aprovado"
    } else {
        "Recuperação"
    }
}

/// Builds the class CSV in ranking order. Returns the text and the number of
/// data rows.
pub fn students_csv(stats: &[StudentStats], graded_only: bool) -> (String, usize) {
    let mut rows: Vec<StudentStats> = stats
        .iter()
        .filter(|s| !graded_only || s.count > 0)
        .cloned()
        .collect();
    sort_by_average_desc(&mut rows);

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for s in &rows {
        let fields = [
            quote(&s.student.name),
            quote(s.student.enrollment_code.as_deref().unwrap_or("")),
            quote(&format_one_decimal(s.average)),
            quote(export_status(s.average)),
        ];
        lines.push(fields.join(","));
    }
    (lines.join("\n"), rows.len())
}

pub fn write_csv(path: &Path, csv: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(())
}
