use serde::{Deserialize, Serialize};

/// Kiosk settings, stored as `settings.json` next to the binary. The
/// spreadsheet id is the only hard precondition for ledger access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_token: String::new(),
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> String {
    "reports".to_string()
}
