use std::path::Path;

use crate::models::Settings;

const ENV_SPREADSHEET_ID: &str = "SPREADSHEET_ID";
const ENV_API_TOKEN: &str = "SHEETS_API_TOKEN";

pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn spreadsheet_id_from_env() -> Option<String> {
    non_empty_env(ENV_SPREADSHEET_ID)
}

pub fn api_token_from_env() -> Option<String> {
    non_empty_env(ENV_API_TOKEN)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn apply_env_defaults(settings: &mut Settings) {
    if settings.spreadsheet_id.trim().is_empty() {
        settings.spreadsheet_id = spreadsheet_id_from_env().unwrap_or_default();
    }
    if settings.api_token.trim().is_empty() {
        settings.api_token = api_token_from_env().unwrap_or_default();
    }
}

/// Load settings from disk; a missing or corrupt file falls back to defaults
/// (missing spreadsheet id is caught later, before any ledger call).
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Settings>(&content).ok())
        .unwrap_or_default();
    apply_env_defaults(&mut settings);
    settings
}

pub fn save_settings(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}
