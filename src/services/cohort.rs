use std::collections::BTreeSet;

use chrono::Datelike;

use crate::error::AttendanceError;
use crate::models::student::{DirectoryCache, Student, StudentDirectory};
use crate::models::visit::{parse_ledger, VisitRecord};
use crate::services::ledger::LedgerClient;

/// Students with at least one completed (entry + exit) visit in the target
/// month. Ids the directory cannot resolve are dropped outright, unlike the
/// aggregator's "Unknown" fallback.
pub fn students_with_completed_visits(
    records: &[VisitRecord],
    directory: &StudentDirectory,
    year: i32,
    month: u32,
) -> Vec<Student> {
    let mut ids = BTreeSet::new();
    for record in records {
        if record.entry.year() != year || record.entry.month() != month {
            continue;
        }
        if record.is_open() {
            continue;
        }
        ids.insert(record.student_id.as_str());
    }

    ids.into_iter()
        .filter_map(|id| {
            directory.name_of(id).map(|name| Student {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Fetch, validate, and select the month's cohort.
pub async fn monthly_cohort(
    client: &LedgerClient,
    directory: &DirectoryCache,
    year: i32,
    month: u32,
) -> Result<Vec<Student>, AttendanceError> {
    let (rows, directory) = tokio::try_join!(
        client.fetch_attendance_rows(),
        directory.get_or_fetch(client)
    )?;

    let (records, skipped) = parse_ledger(&rows);
    if skipped > 0 {
        log::warn!("ignored {skipped} malformed ledger rows during cohort selection");
    }

    Ok(students_with_completed_visits(&records, &directory, year, month))
}
