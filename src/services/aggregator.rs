use std::collections::BTreeMap;

use chrono::Datelike;

use crate::error::AttendanceError;
use crate::models::report::{DailyRecord, MonthlyAggregate, SleepStats};
use crate::models::student::DirectoryCache;
use crate::models::visit::{parse_ledger, Mood, Purpose, SleepLevel, VisitRecord};
use crate::services::ledger::LedgerClient;

/// Fallback name for ids the directory cannot resolve. Aggregation still
/// proceeds; only the cohort listing drops such ids.
const UNKNOWN_NAME: &str = "Unknown";

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compute the monthly aggregate for one student from validated records.
///
/// Only completed visits (non-empty exit cell) count. Unrecognized or empty
/// survey cells are left out of the tallies but the visit still counts
/// toward attendance and the stay average. Pure function of its inputs:
/// aggregating the same snapshot twice yields identical results.
pub fn aggregate_records(
    records: &[VisitRecord],
    student_id: &str,
    student_name: &str,
    year: i32,
    month: u32,
) -> MonthlyAggregate {
    let mut mood_distribution: BTreeMap<Mood, u32> =
        Mood::ALL.iter().map(|mood| (*mood, 0)).collect();
    let mut sleep_distribution: BTreeMap<SleepLevel, u32> =
        SleepLevel::ALL.iter().map(|level| (*level, 0)).collect();
    let mut purpose_distribution: BTreeMap<Purpose, u32> =
        Purpose::ALL.iter().map(|purpose| (*purpose, 0)).collect();

    let mut daily_records = Vec::new();
    let mut total_stay: i64 = 0;
    let mut sleep_values: Vec<u32> = Vec::new();

    for record in records {
        if record.student_id != student_id {
            continue;
        }
        if record.entry.year() != year || record.entry.month() != month {
            continue;
        }
        if record.is_open() {
            // Open visits never count toward monthly stats.
            continue;
        }

        let stay = record.stay_minutes();
        total_stay += stay;

        if let Some(mood) = record.mood {
            *mood_distribution.entry(mood).or_default() += 1;
        }
        if let Some(percent) = record.sleep_percent {
            sleep_values.push(percent);
            if let Some(level) = SleepLevel::from_percent(percent) {
                *sleep_distribution.entry(level).or_default() += 1;
            }
        }
        if let Some(purpose) = record.purpose {
            *purpose_distribution.entry(purpose).or_default() += 1;
        }

        daily_records.push(DailyRecord {
            date: record.entry.format("%Y-%m-%d").to_string(),
            entry_time: record.entry.format("%H:%M").to_string(),
            exit_time: record
                .exit
                .map(|exit| exit.format("%H:%M").to_string())
                .unwrap_or_default(),
            stay_minutes: stay,
            mood: record.mood.map(|m| m.as_str().to_string()).unwrap_or_default(),
            sleep_satisfaction: record
                .sleep_percent
                .map(|p| format!("{p}%"))
                .unwrap_or_default(),
            purpose: record
                .purpose
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        });
    }

    let attendance_count = daily_records.len() as u32;
    let average_stay_minutes = if attendance_count > 0 {
        round1(total_stay as f64 / f64::from(attendance_count))
    } else {
        0.0
    };
    let average_percentage = if sleep_values.is_empty() {
        0.0
    } else {
        round1(sleep_values.iter().map(|v| f64::from(*v)).sum::<f64>() / sleep_values.len() as f64)
    };

    MonthlyAggregate {
        student_id: student_id.to_string(),
        student_name: student_name.to_string(),
        year,
        month,
        attendance_count,
        average_stay_minutes,
        daily_records,
        mood_distribution,
        sleep_stats: SleepStats {
            average_percentage,
            distribution: sleep_distribution,
        },
        purpose_distribution,
    }
}

/// Fetch the ledger and directory, then aggregate one student's month.
/// Fails only when ledger fetch retries exhaust; an id the directory cannot
/// resolve reports as "Unknown".
pub async fn monthly_report(
    client: &LedgerClient,
    directory: &DirectoryCache,
    student_id: &str,
    year: i32,
    month: u32,
) -> Result<MonthlyAggregate, AttendanceError> {
    let (rows, directory) = tokio::try_join!(
        client.fetch_attendance_rows(),
        directory.get_or_fetch(client)
    )?;

    let (records, skipped) = parse_ledger(&rows);
    if skipped > 0 {
        log::warn!("ignored {skipped} malformed ledger rows during aggregation");
    }

    let student_name = directory.name_of(student_id).unwrap_or(UNKNOWN_NAME);
    Ok(aggregate_records(&records, student_id, student_name, year, month))
}
