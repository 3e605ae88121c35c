use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AttendanceError;
use crate::models::settings::Settings;

pub const ATTENDANCE_SHEET: &str = "生徒出席情報";
pub const DIRECTORY_SHEET: &str = "塾生番号＿名前＿QRコード";

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Timestamps are written back in the primary ledger format.
const LEDGER_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Column G holds the exit timestamp (1-based cell coordinates).
const EXIT_COLUMN: u32 = 7;

/// Survey questions and their fixed ledger columns. Not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyQuestion {
    Mood,
    Sleep,
    Purpose,
}

impl SurveyQuestion {
    pub fn column(self) -> u32 {
        match self {
            SurveyQuestion::Mood => 4,
            SurveyQuestion::Sleep => 5,
            SurveyQuestion::Purpose => 6,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WriteBody {
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
struct AppendUpdates {
    #[serde(rename = "updatedRange")]
    updated_range: Option<String>,
}

fn range_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"![A-Z]+(\d+)").expect("valid regex"))
}

/// Extract the 1-based row from a range like `'生徒出席情報'!A42:G42`.
fn row_from_range(range: &str) -> Option<u32> {
    range_row()
        .captures(range)
        .and_then(|captures| captures.get(1))
        .and_then(|group| group.as_str().parse().ok())
}

fn column_letter(column: u32) -> char {
    // The ledger only spans columns A..G.
    (b'A' + (column - 1) as u8) as char
}

fn write_err(err: reqwest::Error) -> AttendanceError {
    AttendanceError::WriteFailure(err.to_string())
}

/// Retry an operation with exponential backoff. On exhaustion the attempt
/// count and last error are handed back to the caller.
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(
    attempts: u32,
    base: Duration,
    what: &str,
    mut op: F,
) -> Result<T, (u32, E)>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = base;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                log::warn!(
                    "{what}: attempt {attempt}/{attempts} failed ({err}); retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err((attempt, err)),
        }
    }
}

/// Client for the attendance and directory sheets.
///
/// Reads are retried with backoff and surface `LedgerUnavailable` only after
/// exhaustion. Writes are never retried automatically; a duplicate visit row
/// from a retried partial failure is worse than a surfaced error.
pub struct LedgerClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    api_token: String,
}

impl LedgerClient {
    /// Fails with `ConfigurationMissing` before any network I/O when the
    /// spreadsheet id is absent.
    pub fn new(settings: &Settings) -> Result<LedgerClient, AttendanceError> {
        let spreadsheet_id = settings.spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(AttendanceError::ConfigurationMissing);
        }
        Ok(LedgerClient {
            http: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            api_token: settings.api_token.trim().to_string(),
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!("{API_BASE}/{}/values/{range}", self.spreadsheet_id)
    }

    async fn fetch_values(&self, sheet: &str) -> Result<Vec<Vec<String>>, reqwest::Error> {
        let response = self
            .http
            .get(self.values_url(sheet))
            .bearer_auth(&self.api_token)
            .send()
            .await?
            .error_for_status()?;
        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn fetch_with_retry(
        &self,
        sheet: &str,
    ) -> Result<Vec<Vec<String>>, AttendanceError> {
        retry_with_backoff(FETCH_ATTEMPTS, FETCH_BACKOFF_BASE, "ledger fetch", move || {
            self.fetch_values(sheet)
        })
        .await
        .map_err(|(attempts, source)| AttendanceError::LedgerUnavailable { attempts, source })
    }

    /// Full attendance row set, header included. Never cached: visit state
    /// must reflect the latest external writes.
    pub async fn fetch_attendance_rows(&self) -> Result<Vec<Vec<String>>, AttendanceError> {
        self.fetch_with_retry(ATTENDANCE_SHEET).await
    }

    /// Full directory row set, header included.
    pub async fn fetch_directory_rows(&self) -> Result<Vec<Vec<String>>, AttendanceError> {
        self.fetch_with_retry(DIRECTORY_SHEET).await
    }

    /// Append a fresh visit row (entry stamp, id, name, empty survey cells,
    /// empty exit). Returns the sheet row the server reports it wrote.
    pub async fn append_visit(
        &self,
        student_id: &str,
        student_name: &str,
        now: NaiveDateTime,
    ) -> Result<u32, AttendanceError> {
        let body = WriteBody {
            values: vec![vec![
                now.format(LEDGER_TIME_FORMAT).to_string(),
                student_id.to_string(),
                student_name.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]],
        };
        let url = format!("{}:append", self.values_url(ATTENDANCE_SHEET));
        let response = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(write_err)?
            .error_for_status()
            .map_err(write_err)?;

        let parsed: AppendResponse = response.json().await.map_err(write_err)?;
        parsed
            .updates
            .and_then(|updates| updates.updated_range)
            .as_deref()
            .and_then(row_from_range)
            .ok_or_else(|| {
                AttendanceError::WriteFailure(
                    "append response did not name the written row".to_string(),
                )
            })
    }

    /// Stamp the exit time on an open visit row. Patch-once: callers only
    /// reach this through reconciliation, which targets rows with an empty
    /// exit cell.
    pub async fn close_visit(&self, row: u32, now: NaiveDateTime) -> Result<(), AttendanceError> {
        let stamp = now.format(LEDGER_TIME_FORMAT).to_string();
        self.update_cell(row, EXIT_COLUMN, &stamp).await
    }

    /// Patch one survey answer cell on an existing visit row.
    pub async fn write_survey_answer(
        &self,
        row: u32,
        question: SurveyQuestion,
        value: &str,
    ) -> Result<(), AttendanceError> {
        self.update_cell(row, question.column(), value).await
    }

    async fn update_cell(
        &self,
        row: u32,
        column: u32,
        value: &str,
    ) -> Result<(), AttendanceError> {
        let range = format!("{ATTENDANCE_SHEET}!{}{row}", column_letter(column));
        let body = serde_json::json!({
            "range": range,
            "values": [[value]],
        });
        self.http
            .put(self.values_url(&range))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(write_err)?
            .error_for_status()
            .map_err(write_err)?;
        Ok(())
    }
}
