use chrono::Datelike;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::api::DrawSource;
use crate::config::Config;
use crate::database::DrawStore;
use crate::error::{FetchError, LotteryError, Result};
use crate::freshness::{Clock, FreshnessRecord, is_stale};
use crate::lottery::LotteryType;
use crate::normalize::normalize_batch;
use crate::stats::StatsCache;
use crate::types::{FreshnessOutcome, NewSyncLog, SyncReport, SyncStatus};

pub const MIN_FORCE_SYNC_PERIODS: usize = 1;
pub const MAX_FORCE_SYNC_PERIODS: usize = 50;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub default_periods: usize,
    pub max_fetch_periods: usize,
    pub fetch_timeout: Duration,
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_periods: config.default_sync_periods,
            max_fetch_periods: config.max_fetch_periods,
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

/// Per-type sync state. The mutex serializes refresh attempts; `completed`
/// counts freshness-driven refreshes only, so a caller that queued behind one
/// reuses its outcome. Forced syncs leave it alone and waiters re-check.
#[derive(Default)]
struct TypeSlot {
    record: Mutex<FreshnessRecord>,
    completed: AtomicU64,
}

/// Keeps the store current on demand: checks freshness, fetches from the
/// remote source with at most one in-flight fetch per lottery type, merges
/// and logs every attempt.
pub struct SyncOrchestrator {
    store: Arc<DrawStore>,
    source: Arc<dyn DrawSource>,
    clock: Arc<dyn Clock>,
    cache: Arc<StatsCache>,
    settings: SyncSettings,
    slots: HashMap<LotteryType, TypeSlot>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<DrawStore>,
        source: Arc<dyn DrawSource>,
        clock: Arc<dyn Clock>,
        cache: Arc<StatsCache>,
        settings: SyncSettings,
    ) -> Self {
        let slots = LotteryType::ALL
            .into_iter()
            .map(|t| (t, TypeSlot::default()))
            .collect();
        Self {
            store,
            source,
            clock,
            cache,
            settings,
            slots,
        }
    }

    fn slot(&self, lottery_type: LotteryType) -> &TypeSlot {
        // every type gets a slot in `new`
        &self.slots[&lottery_type]
    }

    /// Refreshes `lottery_type` when its latest stored draw is stale. Remote
    /// failures are logged and reported as an outcome, never as an error.
    pub async fn ensure_fresh(
        &self,
        lottery_type: LotteryType,
        min_periods_hint: usize,
    ) -> Result<FreshnessOutcome> {
        let slot = self.slot(lottery_type);
        let seen = slot.completed.load(Ordering::Acquire);
        let mut record = slot.record.lock().await;

        if slot.completed.load(Ordering::Acquire) != seen {
            if let Some(outcome) = record.last_refresh {
                debug!("{}: reusing outcome of concurrent refresh ({})", lottery_type, outcome);
                return Ok(outcome);
            }
        }

        let latest = self.store.latest(lottery_type)?;
        let today = self.clock.today();
        if !is_stale(lottery_type, latest.as_ref().map(|d| d.draw_date), today) {
            record.checked(self.clock.now(), FreshnessOutcome::UpToDate);
            return Ok(FreshnessOutcome::UpToDate);
        }

        let periods = min_periods_hint
            .max(self.settings.default_periods)
            .min(self.settings.max_fetch_periods);
        info!(
            "{}: stored data is stale (latest {:?}, today {}), fetching {} periods",
            lottery_type,
            latest.as_ref().map(|d| d.period.as_str()),
            today,
            periods
        );

        if lottery_type.spec().draws_on(today.weekday()) {
            debug!("{}: draw day, today's result may not be published yet", lottery_type);
        }

        let report = self.attempt(lottery_type, periods).await?;
        record.refreshed(self.clock.now(), report.outcome);
        slot.completed.fetch_add(1, Ordering::Release);
        Ok(report.outcome)
    }

    /// Fetches regardless of freshness. `periods` is clamped to 1..=50.
    pub async fn force_sync(
        &self,
        lottery_type: LotteryType,
        periods: usize,
    ) -> Result<SyncReport> {
        let periods = periods.clamp(MIN_FORCE_SYNC_PERIODS, MAX_FORCE_SYNC_PERIODS);
        let slot = self.slot(lottery_type);
        let mut record = slot.record.lock().await;

        info!("{}: forced sync of {} periods", lottery_type, periods);
        let report = self.attempt(lottery_type, periods).await?;
        record.attempted(self.clock.now(), report.outcome);
        Ok(report)
    }

    /// Number of completed refresh attempts for a type.
    pub async fn attempts(&self, lottery_type: LotteryType) -> u64 {
        self.slot(lottery_type).record.lock().await.attempts
    }

    async fn attempt(&self, lottery_type: LotteryType, periods: usize) -> Result<SyncReport> {
        let fetch_timeout = self.settings.fetch_timeout;
        let fetch = self.source.fetch_draws(lottery_type, periods);
        let fetched = match timeout(fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(fetch_timeout)),
        };

        let raws = match fetched {
            Ok(raws) => raws,
            Err(e) => return self.record_failure(lottery_type, periods, 0, 0, e),
        };

        let (accepted, rejected) = normalize_batch(lottery_type, &raws);
        if accepted.is_empty() {
            let e = FetchError::AllRejected(raws.len());
            return self.record_failure(lottery_type, periods, raws.len(), rejected.len(), e);
        }

        let inserted = match self.store.upsert(lottery_type, &accepted) {
            Ok(n) => n,
            Err(e) => {
                error!("{}: failed to merge fetched draws: {}", lottery_type, e);
                self.log_storage_failure(lottery_type, periods, rejected.len(), &e);
                return Err(e);
            }
        };
        self.cache.invalidate(lottery_type);

        let (status, error_message) = if rejected.is_empty() {
            (SyncStatus::Success, None)
        } else {
            let periods: Vec<&str> = rejected.iter().map(|(p, _)| p.as_str()).collect();
            (
                SyncStatus::Partial,
                Some(format!("rejected periods: {}", periods.join(", "))),
            )
        };

        let entry = NewSyncLog {
            lottery_type,
            synced_at: self.clock.now(),
            requested_periods: periods,
            status,
            records_merged: inserted,
            records_rejected: rejected.len(),
            error_message: error_message.clone(),
        };
        if let Err(e) = self.store.append_sync_log(&entry) {
            error!("{}: failed to record sync: {}", lottery_type, e);
            self.log_storage_failure(lottery_type, periods, rejected.len(), &e);
            return Err(e);
        }

        info!(
            "{}: sync {} - fetched {}, inserted {}, rejected {}",
            lottery_type,
            status.as_str(),
            raws.len(),
            inserted,
            rejected.len()
        );

        Ok(SyncReport {
            lottery_type,
            requested_periods: periods,
            outcome: FreshnessOutcome::Refreshed,
            fetched: raws.len(),
            inserted,
            rejected: rejected.len(),
            error: error_message,
        })
    }

    /// Best effort: the store is already failing, so a second error is only traced.
    fn log_storage_failure(
        &self,
        lottery_type: LotteryType,
        periods: usize,
        rejected: usize,
        e: &LotteryError,
    ) {
        let entry = NewSyncLog {
            lottery_type,
            synced_at: self.clock.now(),
            requested_periods: periods,
            status: SyncStatus::Failure,
            records_merged: 0,
            records_rejected: rejected,
            error_message: Some(e.to_string()),
        };
        if let Err(log_err) = self.store.append_sync_log(&entry) {
            error!("{}: could not record failed sync: {}", lottery_type, log_err);
        }
    }

    fn record_failure(
        &self,
        lottery_type: LotteryType,
        periods: usize,
        fetched: usize,
        rejected: usize,
        e: FetchError,
    ) -> Result<SyncReport> {
        warn!("{}: refresh failed, serving stored data: {}", lottery_type, e);
        let message = e.to_string();
        self.store.append_sync_log(&NewSyncLog {
            lottery_type,
            synced_at: self.clock.now(),
            requested_periods: periods,
            status: SyncStatus::Failure,
            records_merged: 0,
            records_rejected: rejected,
            error_message: Some(message.clone()),
        })?;

        Ok(SyncReport {
            lottery_type,
            requested_periods: periods,
            outcome: FreshnessOutcome::RefreshFailedServingStale,
            fetched,
            inserted: 0,
            rejected,
            error: Some(message),
        })
    }
}
