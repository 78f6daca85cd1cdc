use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::lottery::LotteryType;
use crate::types::FreshnessOutcome;

/// Draws are scheduled on China Standard Time (UTC+8).
const DRAW_TIMEZONE_OFFSET_HOURS: i64 = 8;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date in the draw timezone.
    fn today(&self) -> NaiveDate {
        (self.now() + TimeDelta::hours(DRAW_TIMEZONE_OFFSET_HOURS)).date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// True when the latest stored draw is older than the type's threshold.
/// The threshold itself is still fresh; a missing draw is always stale.
pub fn is_stale(
    lottery_type: LotteryType,
    latest_draw_date: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    match latest_draw_date {
        None => true,
        Some(latest) => (today - latest).num_days() > lottery_type.spec().staleness_days,
    }
}

/// What the orchestrator last learned about one lottery type.
#[derive(Debug, Clone, Default)]
pub struct FreshnessRecord {
    pub last_checked: Option<DateTime<Utc>>,
    pub last_outcome: Option<FreshnessOutcome>,
    /// Outcome of the last refresh triggered by a stale check, not by a forced sync.
    pub last_refresh: Option<FreshnessOutcome>,
    /// Number of completed refresh attempts.
    pub attempts: u64,
}

impl FreshnessRecord {
    pub fn checked(&mut self, at: DateTime<Utc>, outcome: FreshnessOutcome) {
        self.last_checked = Some(at);
        self.last_outcome = Some(outcome);
    }

    pub fn attempted(&mut self, at: DateTime<Utc>, outcome: FreshnessOutcome) {
        self.checked(at, outcome);
        self.attempts += 1;
    }

    pub fn refreshed(&mut self, at: DateTime<Utc>, outcome: FreshnessOutcome) {
        self.attempted(at, outcome);
        self.last_refresh = Some(outcome);
    }
}
