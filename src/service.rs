use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::{CwlClient, DrawSource};
use crate::backtest::{BacktestEngine, BacktestReport};
use crate::config::Config;
use crate::database::DrawStore;
use crate::error::Result;
use crate::freshness::{Clock, SystemClock};
use crate::lottery::LotteryType;
use crate::recommend::{RecommendationEngine, RecommendedSet, Strategy};
use crate::stats::{NumberStatistic, StatisticsEngine, StatsCache, bound_window};
use crate::sync::{SyncOrchestrator, SyncSettings};
use crate::types::{DatabaseInfo, DrawResult, FreshnessOutcome, SyncReport};

pub const MAX_HISTORY_PERIODS: usize = 500;
const RECENT_SYNC_LOGS: usize = 10;

/// Data served from the store, tagged with what the freshness check did
/// before reading it.
#[derive(Debug, Clone, Serialize)]
pub struct Served<T> {
    pub freshness: FreshnessOutcome,
    pub data: T,
}

/// The query surface: every read first makes sure the type is fresh, then
/// reads only from the local store.
pub struct LotteryService {
    store: Arc<DrawStore>,
    sync: SyncOrchestrator,
    stats: Arc<StatisticsEngine>,
    recommender: RecommendationEngine,
    backtester: BacktestEngine,
    analysis_periods: usize,
}

impl LotteryService {
    /// Production wiring: file-backed store, CWL client, system clock.
    pub fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(DrawStore::open(&config.database_url)?);
        let client = CwlClient::new(&config.api_base_url, config.fetch_timeout())?;
        Ok(Self::with_parts(
            config,
            store,
            Arc::new(client),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_parts(
        config: &Config,
        store: Arc<DrawStore>,
        source: Arc<dyn DrawSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(StatsCache::default());
        let stats = Arc::new(StatisticsEngine::new(Arc::clone(&store), Arc::clone(&cache)));
        let sync = SyncOrchestrator::new(
            Arc::clone(&store),
            source,
            clock,
            cache,
            SyncSettings::from(config),
        );

        Self {
            recommender: RecommendationEngine::new(Arc::clone(&stats), config.analysis_periods),
            backtester: BacktestEngine::new(Arc::clone(&store), config.backtest_sets),
            analysis_periods: config.analysis_periods,
            store,
            sync,
            stats,
        }
    }

    pub async fn latest(&self, lottery_type: LotteryType) -> Result<Served<Option<DrawResult>>> {
        let freshness = self.sync.ensure_fresh(lottery_type, 1).await?;
        Ok(Served {
            freshness,
            data: self.store.latest(lottery_type)?,
        })
    }

    /// Newest-first draws, `periods` clamped to 1..=500.
    pub async fn history(
        &self,
        lottery_type: LotteryType,
        periods: usize,
    ) -> Result<Served<Vec<DrawResult>>> {
        let periods = periods.clamp(1, MAX_HISTORY_PERIODS);
        let freshness = self.sync.ensure_fresh(lottery_type, periods).await?;
        Ok(Served {
            freshness,
            data: self.store.range(lottery_type, periods)?,
        })
    }

    pub async fn analyze(
        &self,
        lottery_type: LotteryType,
        window: usize,
    ) -> Result<Served<Arc<NumberStatistic>>> {
        let window = bound_window(window);
        let freshness = self.sync.ensure_fresh(lottery_type, window).await?;
        Ok(Served {
            freshness,
            data: self.stats.analyze(lottery_type, window)?,
        })
    }

    pub async fn recommend(
        &self,
        lottery_type: LotteryType,
        count: usize,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> Result<Served<Vec<RecommendedSet>>> {
        let hint = if strategy.is_weighted() { self.analysis_periods } else { 1 };
        let freshness = self.sync.ensure_fresh(lottery_type, hint).await?;
        Ok(Served {
            freshness,
            data: self.recommender.generate(lottery_type, count, strategy, seed)?,
        })
    }

    pub async fn backtest(
        &self,
        lottery_type: LotteryType,
        window_size: usize,
        step: usize,
        seed: Option<u64>,
    ) -> Result<Served<BacktestReport>> {
        let freshness = self
            .sync
            .ensure_fresh(lottery_type, window_size.saturating_add(step))
            .await?;
        Ok(Served {
            freshness,
            data: self.backtester.run(lottery_type, window_size, step, seed)?,
        })
    }

    pub async fn sync(&self, lottery_type: LotteryType, periods: usize) -> Result<SyncReport> {
        self.sync.force_sync(lottery_type, periods).await
    }

    /// Forces a sync of every type, one after another.
    pub async fn sync_all(&self, periods: usize) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::with_capacity(LotteryType::ALL.len());
        for lottery_type in LotteryType::ALL {
            reports.push(self.sync.force_sync(lottery_type, periods).await?);
        }
        let refreshed = reports
            .iter()
            .filter(|r| r.outcome == FreshnessOutcome::Refreshed)
            .count();
        info!("sync-all finished: {}/{} types refreshed", refreshed, reports.len());
        Ok(reports)
    }

    /// The newest stored draw without a freshness check.
    pub fn latest_stored(&self, lottery_type: LotteryType) -> Result<Option<DrawResult>> {
        self.store.latest(lottery_type)
    }

    pub fn database_info(&self) -> Result<DatabaseInfo> {
        self.store.database_info(RECENT_SYNC_LOGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSource, clock_on, date};

    fn service(source: Arc<FakeSource>) -> LotteryService {
        let config = Config::default();
        LotteryService::with_parts(
            &config,
            Arc::new(DrawStore::open_in_memory().unwrap()),
            source,
            Arc::new(clock_on(date(2025, 7, 17))),
        )
    }

    #[tokio::test]
    async fn test_latest_refreshes_empty_store() {
        let source = Arc::new(FakeSource::with_history(60, date(2025, 7, 17)));
        let service = service(Arc::clone(&source));

        let served = service.latest(LotteryType::Ssq).await.unwrap();
        assert_eq!(served.freshness, FreshnessOutcome::Refreshed);
        assert_eq!(served.data.unwrap().draw_date, date(2025, 7, 17));

        let served = service.latest(LotteryType::Ssq).await.unwrap();
        assert_eq!(served.freshness, FreshnessOutcome::UpToDate);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_still_serves() {
        let service = service(Arc::new(FakeSource::failing()));
        let served = service.history(LotteryType::Kl8, 10).await.unwrap();
        assert_eq!(served.freshness, FreshnessOutcome::RefreshFailedServingStale);
        assert!(served.data.is_empty());

        let analysis = service.analyze(LotteryType::Kl8, 30).await.unwrap();
        assert_eq!(analysis.data.analysis_periods, 0);
    }

    #[tokio::test]
    async fn test_history_fetches_enough_periods() {
        let source = Arc::new(FakeSource::with_history(60, date(2025, 7, 17)));
        let service = service(Arc::clone(&source));

        let served = service.history(LotteryType::Qlc, 40).await.unwrap();
        assert_eq!(served.data.len(), 40);
        assert_eq!(source.requested(), vec![(LotteryType::Qlc, 40)]);
    }

    #[tokio::test]
    async fn test_recommend_and_backtest() {
        let source = Arc::new(FakeSource::with_history(200, date(2025, 7, 17)));
        let service = service(Arc::clone(&source));

        let sets = service
            .recommend(LotteryType::Fc3d, 3, Strategy::HotWeighted, Some(1))
            .await
            .unwrap();
        assert_eq!(sets.data.len(), 3);
        assert_eq!(sets.data[0].statistics_window, Some(30));

        // the store now holds 30 periods, still fresh, so no refill
        let report = service.backtest(LotteryType::Fc3d, 50, 25, Some(1)).await.unwrap();
        assert_eq!(report.freshness, FreshnessOutcome::UpToDate);
        assert_eq!(report.data.total_periods_tested, 0);

        service.sync(LotteryType::Fc3d, 50).await.unwrap();
        let report = service.backtest(LotteryType::Fc3d, 10, 10, Some(1)).await.unwrap();
        assert_eq!(report.data.window_size, 50);
        assert_eq!(report.data.available_periods, 50);
        assert_eq!(report.data.total_periods_tested, 0);
    }

    #[tokio::test]
    async fn test_sync_all_and_database_info() {
        let source = Arc::new(FakeSource::with_history(20, date(2025, 7, 17)));
        let service = service(source);

        let reports = service.sync_all(30).await.unwrap();
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.inserted == 20));

        let info = service.database_info().unwrap();
        assert_eq!(info.types.len(), 4);
        assert!(info.types.iter().all(|t| t.records == 20));
        assert_eq!(info.recent_syncs.len(), 4);
    }
}
