use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::models::report::MonthlyAggregate;

/// Characters Windows refuses in filenames; student names flow into report
/// filenames, so they are stripped rather than escaped.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Filename the external PDF renderer expects for a per-student report.
pub fn pdf_report_filename(
    year: i32,
    month: u32,
    student_id: &str,
    student_name: &str,
    generated_at: NaiveDateTime,
) -> String {
    format!(
        "{year:04}-{month:02}_{student_id}_{}_{}.pdf",
        sanitize_filename(student_name),
        generated_at.format("%Y%m%d_%H%M%S"),
    )
}

/// Filename the external Excel renderer expects for the monthly summary.
pub fn excel_report_filename(month: u32, generated_at: NaiveDateTime) -> String {
    format!(
        "{month}月の出席レポート_{}.{}.xlsx",
        generated_at.format("%Y-%m-%d"),
        generated_at.format("%H-%M-%S"),
    )
}

/// Drop the aggregate as a JSON sidecar in the reports directory; the
/// document renderers pick it up from there.
pub fn write_aggregate_json(
    reports_dir: &Path,
    aggregate: &MonthlyAggregate,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(reports_dir)?;
    let filename = format!(
        "{:04}-{:02}_{}_{}.json",
        aggregate.year,
        aggregate.month,
        aggregate.student_id,
        sanitize_filename(&aggregate.student_name),
    );
    let path = reports_dir.join(filename);
    std::fs::write(&path, serde_json::to_string_pretty(aggregate)?)?;
    Ok(path)
}
