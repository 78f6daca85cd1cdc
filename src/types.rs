use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lottery::LotteryType;

#[derive(Deserialize, Debug)]
pub struct DrawNoticeResponse {
    pub state: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Vec<RawDraw>,
}

/// One draw as delivered by the remote source, before validation.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RawDraw {
    pub code: String,
    pub date: String,
    pub red: String,
    #[serde(default)]
    pub blue: Option<String>,
    #[serde(default)]
    pub poolmoney: Option<String>,
    #[serde(default)]
    pub sales: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawResult {
    pub lottery_type: LotteryType,
    pub period: String,
    pub draw_date: NaiveDate,
    /// Sorted ascending.
    pub main_numbers: Vec<u8>,
    /// Same numbers in the order they were drawn.
    pub drawn_numbers: Vec<u8>,
    pub special_numbers: Vec<u8>,
    pub prize_pool: Option<String>,
    pub sales_amount: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    Failure,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(SyncStatus::Success),
            "partial" => Some(SyncStatus::Partial),
            "failure" => Some(SyncStatus::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncLog {
    pub id: i64,
    pub lottery_type: LotteryType,
    pub synced_at: DateTime<Utc>,
    pub requested_periods: usize,
    pub status: SyncStatus,
    pub records_merged: usize,
    pub records_rejected: usize,
    pub error_message: Option<String>,
}

/// A sync log entry about to be written; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSyncLog {
    pub lottery_type: LotteryType,
    pub synced_at: DateTime<Utc>,
    pub requested_periods: usize,
    pub status: SyncStatus,
    pub records_merged: usize,
    pub records_rejected: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessOutcome {
    UpToDate,
    Refreshed,
    RefreshFailedServingStale,
}

impl fmt::Display for FreshnessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FreshnessOutcome::UpToDate => "up_to_date",
            FreshnessOutcome::Refreshed => "refreshed",
            FreshnessOutcome::RefreshFailedServingStale => "refresh_failed_serving_stale",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub lottery_type: LotteryType,
    pub requested_periods: usize,
    pub outcome: FreshnessOutcome,
    pub fetched: usize,
    pub inserted: usize,
    pub rejected: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSummary {
    pub lottery_type: LotteryType,
    pub name: &'static str,
    pub records: usize,
    pub latest_period: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInfo {
    pub types: Vec<TypeSummary>,
    pub recent_syncs: Vec<SyncLog>,
}
