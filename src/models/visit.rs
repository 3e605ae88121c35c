use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::time_parser::parse_timestamp;

/// Weather-themed mood answer (ledger column D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mood {
    #[serde(rename = "快晴")]
    Sunny,
    #[serde(rename = "晴れ")]
    PartlyCloudy,
    #[serde(rename = "くもり")]
    Cloudy,
    #[serde(rename = "雨")]
    Rain,
    #[serde(rename = "豪雨")]
    HeavyRain,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Sunny,
        Mood::PartlyCloudy,
        Mood::Cloudy,
        Mood::Rain,
        Mood::HeavyRain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Sunny => "快晴",
            Mood::PartlyCloudy => "晴れ",
            Mood::Cloudy => "くもり",
            Mood::Rain => "雨",
            Mood::HeavyRain => "豪雨",
        }
    }

    /// Unrecognized or empty cells map to `None` and stay out of the tallies.
    pub fn from_cell(cell: &str) -> Option<Mood> {
        Mood::ALL.iter().copied().find(|mood| mood.as_str() == cell.trim())
    }
}

/// Visit purpose answer (ledger column F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Purpose {
    #[serde(rename = "来る")]
    Come,
    #[serde(rename = "学ぶ")]
    Learn,
    #[serde(rename = "話す")]
    Talk,
    #[serde(rename = "楽しむ")]
    Enjoy,
    #[serde(rename = "整える")]
    Prepare,
}

impl Purpose {
    pub const ALL: [Purpose; 5] = [
        Purpose::Come,
        Purpose::Learn,
        Purpose::Talk,
        Purpose::Enjoy,
        Purpose::Prepare,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Come => "来る",
            Purpose::Learn => "学ぶ",
            Purpose::Talk => "話す",
            Purpose::Enjoy => "楽しむ",
            Purpose::Prepare => "整える",
        }
    }

    pub fn from_cell(cell: &str) -> Option<Purpose> {
        Purpose::ALL
            .iter()
            .copied()
            .find(|purpose| purpose.as_str() == cell.trim())
    }
}

/// Canonical sleep-satisfaction buckets (ledger column E). Labels use
/// full-width digits because that is what the kiosk survey writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SleepLevel {
    #[serde(rename = "０％")]
    P0,
    #[serde(rename = "２５％")]
    P25,
    #[serde(rename = "５０％")]
    P50,
    #[serde(rename = "７５％")]
    P75,
    #[serde(rename = "１００％")]
    P100,
}

impl SleepLevel {
    pub const ALL: [SleepLevel; 5] = [
        SleepLevel::P0,
        SleepLevel::P25,
        SleepLevel::P50,
        SleepLevel::P75,
        SleepLevel::P100,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SleepLevel::P0 => "０％",
            SleepLevel::P25 => "２５％",
            SleepLevel::P50 => "５０％",
            SleepLevel::P75 => "７５％",
            SleepLevel::P100 => "１００％",
        }
    }

    /// Only the five canonical percentages land in the distribution; other
    /// numeric values still feed the sleep average.
    pub fn from_percent(percent: u32) -> Option<SleepLevel> {
        match percent {
            0 => Some(SleepLevel::P0),
            25 => Some(SleepLevel::P25),
            50 => Some(SleepLevel::P50),
            75 => Some(SleepLevel::P75),
            100 => Some(SleepLevel::P100),
            _ => None,
        }
    }
}

/// Parse a percentage-like sleep cell. The survey writes full-width digits
/// and either `%` or `％`, and older rows mix both.
pub fn parse_sleep_percent(cell: &str) -> Option<u32> {
    let normalized: String = cell
        .trim()
        .chars()
        .filter(|c| *c != '%' && *c != '％')
        .map(|c| match c {
            '０'..='９' => (b'0' + (c as u32 - '０' as u32) as u8) as char,
            other => other,
        })
        .collect();
    normalized.trim().parse().ok()
}

/// Why a ledger row was rejected during validated parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("row has {0} cells, need at least 2")]
    TooShort(usize),
    #[error("student id cell is empty")]
    MissingStudentId,
    #[error("unparseable entry timestamp: {0:?}")]
    BadEntryTimestamp(String),
}

/// One validated attendance ledger row.
///
/// `has_exit` reflects whether column G is non-empty; that alone decides
/// open vs. closed. `exit` is the parsed instant when the cell also parses;
/// a garbage exit cell closes the visit but contributes zero stay time.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRecord {
    /// 1-based sheet row, usable directly as a cell coordinate.
    pub row: u32,
    pub entry: NaiveDateTime,
    pub student_id: String,
    pub student_name: String,
    pub mood: Option<Mood>,
    pub sleep_percent: Option<u32>,
    pub purpose: Option<Purpose>,
    pub has_exit: bool,
    pub exit: Option<NaiveDateTime>,
}

impl VisitRecord {
    pub fn is_open(&self) -> bool {
        !self.has_exit
    }

    /// Whole minutes between entry and exit, clamped to zero. Never negative.
    pub fn stay_minutes(&self) -> i64 {
        match self.exit {
            Some(exit) => (exit - self.entry).num_minutes().max(0),
            None => 0,
        }
    }
}

pub fn parse_visit_row(row: u32, cells: &[String]) -> Result<VisitRecord, RowError> {
    if cells.len() < 2 {
        return Err(RowError::TooShort(cells.len()));
    }
    let student_id = cells[1].trim();
    if student_id.is_empty() {
        return Err(RowError::MissingStudentId);
    }
    let entry = parse_timestamp(&cells[0])
        .ok_or_else(|| RowError::BadEntryTimestamp(cells[0].clone()))?;

    let cell = |index: usize| cells.get(index).map(String::as_str).unwrap_or("").trim();
    let exit_raw = cell(6);

    Ok(VisitRecord {
        row,
        entry,
        student_id: student_id.to_string(),
        student_name: cell(2).to_string(),
        mood: Mood::from_cell(cell(3)),
        sleep_percent: parse_sleep_percent(cell(4)),
        purpose: Purpose::from_cell(cell(5)),
        has_exit: !exit_raw.is_empty(),
        exit: parse_timestamp(exit_raw),
    })
}

/// Validate a full fetched ledger (header row included). Returns the records
/// that parsed plus how many rows were skipped, so callers can log the skip
/// count without any row aborting the whole read.
pub fn parse_ledger(rows: &[Vec<String>]) -> (Vec<VisitRecord>, usize) {
    let mut records = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut skipped = 0;

    // Row 1 is the header.
    for (index, cells) in rows.iter().enumerate().skip(1) {
        let row = (index + 1) as u32;
        match parse_visit_row(row, cells) {
            Ok(record) => records.push(record),
            Err(err) => {
                log::debug!("skipping ledger row {row}: {err}");
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn sleep_percent_accepts_ascii_and_full_width() {
        assert_eq!(parse_sleep_percent("75%"), Some(75));
        assert_eq!(parse_sleep_percent("７５％"), Some(75));
        assert_eq!(parse_sleep_percent("１００％"), Some(100));
        assert_eq!(parse_sleep_percent("0％"), Some(0));
        assert_eq!(parse_sleep_percent(" 50 % "), Some(50));
    }

    #[test]
    fn sleep_percent_rejects_non_numeric() {
        assert_eq!(parse_sleep_percent(""), None);
        assert_eq!(parse_sleep_percent("ねむい"), None);
        assert_eq!(parse_sleep_percent("75ish"), None);
    }

    #[test]
    fn non_canonical_percent_has_no_bucket() {
        assert_eq!(SleepLevel::from_percent(75), Some(SleepLevel::P75));
        assert_eq!(SleepLevel::from_percent(60), None);
    }

    #[test]
    fn mood_and_purpose_from_cell() {
        assert_eq!(Mood::from_cell("快晴"), Some(Mood::Sunny));
        assert_eq!(Mood::from_cell(" 豪雨 "), Some(Mood::HeavyRain));
        assert_eq!(Mood::from_cell("晴天"), None);
        assert_eq!(Purpose::from_cell("学ぶ"), Some(Purpose::Learn));
        assert_eq!(Purpose::from_cell(""), None);
    }

    #[test]
    fn parses_full_row() {
        let record = parse_visit_row(
            2,
            &cells(&[
                "2025/07/15 10:56:46",
                "S1",
                "Taro",
                "快晴",
                "75%",
                "学ぶ",
                "2025/07/15 11:00:10",
            ]),
        )
        .unwrap();

        assert_eq!(record.row, 2);
        assert_eq!(record.student_id, "S1");
        assert_eq!(record.student_name, "Taro");
        assert_eq!(record.mood, Some(Mood::Sunny));
        assert_eq!(record.sleep_percent, Some(75));
        assert_eq!(record.purpose, Some(Purpose::Learn));
        assert!(record.has_exit);
        // 3m24s truncates to whole minutes.
        assert_eq!(record.stay_minutes(), 3);
    }

    #[test]
    fn short_row_is_still_a_visit() {
        let record =
            parse_visit_row(5, &cells(&["2025/07/15 10:56:46", "S1"])).unwrap();
        assert!(record.is_open());
        assert_eq!(record.student_name, "");
        assert_eq!(record.mood, None);
        assert_eq!(record.stay_minutes(), 0);
    }

    #[test]
    fn rejects_malformed_rows() {
        assert_eq!(
            parse_visit_row(2, &cells(&["2025/07/15 10:56:46"])),
            Err(RowError::TooShort(1))
        );
        assert_eq!(
            parse_visit_row(2, &cells(&["2025/07/15 10:56:46", "  "])),
            Err(RowError::MissingStudentId)
        );
        assert_eq!(
            parse_visit_row(2, &cells(&["yesterday-ish", "S1"])),
            Err(RowError::BadEntryTimestamp("yesterday-ish".to_string()))
        );
    }

    #[test]
    fn garbage_exit_closes_visit_with_zero_stay() {
        let record = parse_visit_row(
            3,
            &cells(&["2025/07/15 10:00:00", "S1", "Taro", "", "", "", "???"]),
        )
        .unwrap();
        assert!(!record.is_open());
        assert_eq!(record.exit, None);
        assert_eq!(record.stay_minutes(), 0);
    }

    #[test]
    fn negative_duration_clamps_to_zero() {
        let record = parse_visit_row(
            3,
            &cells(&[
                "2025/07/15 12:00:00",
                "S1",
                "Taro",
                "",
                "",
                "",
                "2025/07/15 11:00:00",
            ]),
        )
        .unwrap();
        assert_eq!(record.stay_minutes(), 0);
    }

    #[test]
    fn ledger_parse_skips_header_and_counts_bad_rows() {
        let rows = vec![
            cells(&["入室時間", "塾生番号", "名前"]),
            cells(&["2025/07/15 10:00:00", "S1", "Taro"]),
            cells(&["garbage", "S2", "Jiro"]),
            cells(&["2025/07/15 11:00:00", "", ""]),
            cells(&["2025/07/15 12:00:00", "S3", "Saburo"]),
        ];
        let (records, skipped) = parse_ledger(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 2);
        // Sheet rows are 1-based and the header occupies row 1.
        assert_eq!(records[0].row, 2);
        assert_eq!(records[1].row, 5);
    }
}
