use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::visit::{Mood, Purpose, SleepLevel};

/// Per-student monthly statistics, recomputed from the ledger on demand and
/// handed to the external PDF/Excel renderers as JSON. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    pub student_id: String,
    pub student_name: String,
    pub year: i32,
    pub month: u32,
    pub attendance_count: u32,
    pub average_stay_minutes: f64,
    pub daily_records: Vec<DailyRecord>,
    pub mood_distribution: BTreeMap<Mood, u32>,
    pub sleep_stats: SleepStats,
    pub purpose_distribution: BTreeMap<Purpose, u32>,
}

/// One completed visit, formatted for report rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: String,
    pub entry_time: String,
    pub exit_time: String,
    pub stay_minutes: i64,
    pub mood: String,
    pub sleep_satisfaction: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepStats {
    /// Mean over the numeric sleep answers only, not all visits.
    pub average_percentage: f64,
    pub distribution: BTreeMap<SleepLevel, u32>,
}
