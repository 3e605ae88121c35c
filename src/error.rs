use thiserror::Error;

/// Failure taxonomy for the attendance core. Row-level parse failures never
/// reach this level; they are handled by skipping the row.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("spreadsheet_id is not configured")]
    ConfigurationMissing,

    #[error("ledger unavailable after {attempts} attempts: {source}")]
    LedgerUnavailable {
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("student {0} is not registered")]
    UnknownStudent(String),

    #[error("ledger write failed: {0}")]
    WriteFailure(String),
}
