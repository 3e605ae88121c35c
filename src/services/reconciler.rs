use chrono::{NaiveDate, NaiveDateTime};

use crate::error::AttendanceError;
use crate::models::student::DirectoryCache;
use crate::models::visit::{parse_ledger, VisitRecord};
use crate::services::ledger::LedgerClient;

/// A student's current visit state, derived fresh from the ledger on every
/// lookup. Nothing is persisted between scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    NoOpenVisit,
    OpenVisit { row: u32 },
}

/// What a scan did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    CheckedIn { row: u32, student_name: String },
    CheckedOut { row: u32, student_name: String },
}

/// Reverse scan for an open visit on the given calendar date.
///
/// Most recent rows first; the first same-day match with an empty exit cell
/// wins. A closed same-day match does not end the search: an earlier open one
/// should not exist, but a drifted ledger can hold one. O(n) over the full
/// ledger; the remote sheet offers no index.
pub fn find_open_visit(records: &[VisitRecord], student_id: &str, today: NaiveDate) -> VisitState {
    for record in records.iter().rev() {
        if record.student_id != student_id {
            continue;
        }
        if record.entry.date() != today {
            continue;
        }
        if record.is_open() {
            return VisitState::OpenVisit { row: record.row };
        }
    }
    VisitState::NoOpenVisit
}

/// Handle one kiosk scan: refuse unknown ids, then either start a new visit
/// or close the open one, depending on today's ledger state.
pub async fn process_scan(
    client: &LedgerClient,
    directory: &DirectoryCache,
    student_id: &str,
    now: NaiveDateTime,
) -> Result<ScanOutcome, AttendanceError> {
    let directory = directory.get_or_fetch(client).await?;
    let Some(student_name) = directory.name_of(student_id) else {
        return Err(AttendanceError::UnknownStudent(student_id.to_string()));
    };

    let rows = client.fetch_attendance_rows().await?;
    let (records, skipped) = parse_ledger(&rows);
    if skipped > 0 {
        log::warn!("ignored {skipped} malformed ledger rows during reconciliation");
    }

    match find_open_visit(&records, student_id, now.date()) {
        VisitState::NoOpenVisit => {
            let row = client.append_visit(student_id, student_name, now).await?;
            log::info!("checked in {student_id} at row {row}");
            Ok(ScanOutcome::CheckedIn {
                row,
                student_name: student_name.to_string(),
            })
        }
        VisitState::OpenVisit { row } => {
            client.close_visit(row, now).await?;
            log::info!("checked out {student_id} at row {row}");
            Ok(ScanOutcome::CheckedOut {
                row,
                student_name: student_name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visit::parse_visit_row;

    fn record(row: u32, entry: &str, id: &str, exit: &str) -> VisitRecord {
        let cells: Vec<String> = [entry, id, "Name", "", "", "", exit]
            .iter()
            .map(|v| v.to_string())
            .collect();
        parse_visit_row(row, &cells).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 15).unwrap()
    }

    #[test]
    fn empty_ledger_has_no_open_visit() {
        assert_eq!(find_open_visit(&[], "S1", today()), VisitState::NoOpenVisit);
    }

    #[test]
    fn open_visit_today_is_found() {
        let records = vec![
            record(2, "2025/07/14 10:00:00", "S1", "2025/07/14 12:00:00"),
            record(3, "2025/07/15 10:00:00", "S1", ""),
        ];
        assert_eq!(
            find_open_visit(&records, "S1", today()),
            VisitState::OpenVisit { row: 3 }
        );
    }

    #[test]
    fn most_recent_open_visit_wins() {
        let records = vec![
            record(2, "2025/07/15 09:00:00", "S1", ""),
            record(3, "2025/07/15 13:00:00", "S1", ""),
        ];
        assert_eq!(
            find_open_visit(&records, "S1", today()),
            VisitState::OpenVisit { row: 3 }
        );
    }

    #[test]
    fn closed_visit_does_not_end_the_search() {
        // The latest visit today is already closed; an earlier one is still
        // open and must be reported.
        let records = vec![
            record(2, "2025/07/15 09:00:00", "S1", ""),
            record(3, "2025/07/15 13:00:00", "S1", "2025/07/15 14:00:00"),
        ];
        assert_eq!(
            find_open_visit(&records, "S1", today()),
            VisitState::OpenVisit { row: 2 }
        );
    }

    #[test]
    fn yesterdays_open_visit_is_not_todays() {
        let records = vec![record(2, "2025/07/14 10:00:00", "S1", "")];
        assert_eq!(find_open_visit(&records, "S1", today()), VisitState::NoOpenVisit);
    }

    #[test]
    fn other_students_rows_are_ignored() {
        let records = vec![
            record(2, "2025/07/15 10:00:00", "S2", ""),
            record(3, "2025/07/15 11:00:00", "S1", "2025/07/15 12:00:00"),
        ];
        assert_eq!(find_open_visit(&records, "S1", today()), VisitState::NoOpenVisit);
    }

    #[test]
    fn appended_visit_reconciles_as_open_same_day() {
        // Round trip: a just-appended row (no exit) must come back as the
        // open visit for the same calendar day.
        let appended = record(42, "2025/07/15 10:56:46", "S1", "");
        let records = vec![
            record(2, "2025/07/15 08:00:00", "S1", "2025/07/15 09:30:00"),
            appended,
        ];
        assert_eq!(
            find_open_visit(&records, "S1", today()),
            VisitState::OpenVisit { row: 42 }
        );
    }
}
