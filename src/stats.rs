use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::database::DrawStore;
use crate::error::Result;
use crate::lottery::LotteryType;
use crate::types::DrawResult;

pub const MIN_ANALYSIS_PERIODS: usize = 5;
pub const MAX_ANALYSIS_PERIODS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NumberFrequency {
    pub number: u8,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunTally {
    pub numbers: Vec<u8>,
    pub occurrences: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsecutiveAnalysis {
    pub draws_with_runs: usize,
    /// Every observed run, most frequent first.
    pub runs: Vec<RunTally>,
    pub most_frequent: Vec<RunTally>,
    pub least_frequent: Vec<RunTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberStatistic {
    pub lottery_type: LotteryType,
    pub requested_periods: usize,
    pub analysis_periods: usize,
    pub latest_period: Option<String>,
    /// Whole main pool in ascending number order, zeros included.
    pub frequency: Vec<NumberFrequency>,
    pub special_frequency: Vec<NumberFrequency>,
    pub hot_numbers: Vec<NumberFrequency>,
    pub cold_numbers: Vec<NumberFrequency>,
    pub consecutive: ConsecutiveAnalysis,
}

impl NumberStatistic {
    pub fn main_count_of(&self, number: u8) -> u32 {
        count_of(&self.frequency, number)
    }

    pub fn special_count_of(&self, number: u8) -> u32 {
        count_of(&self.special_frequency, number)
    }
}

fn count_of(table: &[NumberFrequency], number: u8) -> u32 {
    table
        .iter()
        .find(|f| f.number == number)
        .map(|f| f.count)
        .unwrap_or(0)
}

pub fn bound_window(requested: usize) -> usize {
    requested.clamp(MIN_ANALYSIS_PERIODS, MAX_ANALYSIS_PERIODS)
}

/// Computes frequency, hot/cold and consecutive-run statistics over the
/// newest `window` draws of `draws` (which must be newest first).
pub fn compute_statistic(
    lottery_type: LotteryType,
    draws: &[DrawResult],
    window: usize,
) -> NumberStatistic {
    let spec = lottery_type.spec();
    let requested_periods = bound_window(window);
    let sample = &draws[..requested_periods.min(draws.len())];

    let mut main_counts: BTreeMap<u8, u32> = spec.main_pool().map(|n| (n, 0)).collect();
    let mut special_counts: BTreeMap<u8, u32> = if spec.has_special() {
        spec.special_pool().map(|n| (n, 0)).collect()
    } else {
        BTreeMap::new()
    };

    for draw in sample {
        for n in &draw.main_numbers {
            *main_counts.entry(*n).or_insert(0) += 1;
        }
        for n in &draw.special_numbers {
            *special_counts.entry(*n).or_insert(0) += 1;
        }
    }

    let frequency: Vec<NumberFrequency> = main_counts
        .into_iter()
        .map(|(number, count)| NumberFrequency { number, count })
        .collect();
    let special_frequency = special_counts
        .into_iter()
        .map(|(number, count)| NumberFrequency { number, count })
        .collect();

    let (hot_numbers, cold_numbers) = hot_and_cold(&frequency);

    NumberStatistic {
        lottery_type,
        requested_periods,
        analysis_periods: sample.len(),
        latest_period: sample.first().map(|d| d.period.clone()),
        frequency,
        special_frequency,
        hot_numbers,
        cold_numbers,
        consecutive: consecutive_runs(sample),
    }
}

/// Hot and cold list length for a pool: 5 to 10, leaving at least five
/// numbers for the cold side where the pool allows.
fn list_size(pool: usize) -> usize {
    let mut k = (pool / 2).clamp(5, 10);
    if pool.saturating_sub(k) < 5 {
        k = pool.saturating_sub(5).max(5);
    }
    k.min(pool)
}

fn hot_and_cold(frequency: &[NumberFrequency]) -> (Vec<NumberFrequency>, Vec<NumberFrequency>) {
    let k = list_size(frequency.len());

    let mut by_hot = frequency.to_vec();
    by_hot.sort_by(|a, b| b.count.cmp(&a.count).then(a.number.cmp(&b.number)));
    let hot: Vec<NumberFrequency> = by_hot.into_iter().take(k).collect();

    let mut by_cold = frequency.to_vec();
    by_cold.sort_by(|a, b| a.count.cmp(&b.count).then(a.number.cmp(&b.number)));
    let cold = by_cold
        .into_iter()
        .filter(|f| !hot.iter().any(|h| h.number == f.number))
        .take(k)
        .collect();

    (hot, cold)
}

/// Maximal runs of adjacent integers (length two or more) in one draw.
pub fn runs_in(numbers: &[u8]) -> Vec<Vec<u8>> {
    let mut sorted = numbers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for n in sorted {
        match current.last() {
            Some(&prev) if prev + 1 == n => current.push(n),
            _ => {
                if current.len() >= 2 {
                    runs.push(std::mem::take(&mut current));
                }
                current = vec![n];
            }
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }
    runs
}

fn consecutive_runs(sample: &[DrawResult]) -> ConsecutiveAnalysis {
    let mut tallies: HashMap<Vec<u8>, u32> = HashMap::new();
    let mut draws_with_runs = 0;

    for draw in sample {
        let runs = runs_in(&draw.main_numbers);
        if !runs.is_empty() {
            draws_with_runs += 1;
        }
        for run in runs {
            *tallies.entry(run).or_insert(0) += 1;
        }
    }

    let mut runs: Vec<RunTally> = tallies
        .into_iter()
        .map(|(numbers, occurrences)| RunTally {
            numbers,
            occurrences,
        })
        .collect();
    runs.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.numbers.cmp(&b.numbers))
    });

    let max = runs.first().map(|r| r.occurrences);
    let min = runs.last().map(|r| r.occurrences);
    let most_frequent = runs
        .iter()
        .filter(|r| Some(r.occurrences) == max)
        .cloned()
        .collect();
    let least_frequent = runs
        .iter()
        .filter(|r| Some(r.occurrences) == min)
        .cloned()
        .collect();

    ConsecutiveAnalysis {
        draws_with_runs,
        runs,
        most_frequent,
        least_frequent,
    }
}

/// Computed statistics keyed by lottery type and bounded window. An entry is
/// only served while the store's latest period matches the one it was built
/// from.
#[derive(Default)]
pub struct StatsCache {
    entries: RwLock<HashMap<(LotteryType, usize), Arc<NumberStatistic>>>,
}

impl StatsCache {
    pub fn get(
        &self,
        lottery_type: LotteryType,
        window: usize,
        latest_period: Option<&str>,
    ) -> Option<Arc<NumberStatistic>> {
        self.entries
            .read()
            .get(&(lottery_type, window))
            .filter(|s| s.latest_period.as_deref() == latest_period)
            .cloned()
    }

    pub fn insert(&self, statistic: NumberStatistic) -> Arc<NumberStatistic> {
        let statistic = Arc::new(statistic);
        self.entries.write().insert(
            (statistic.lottery_type, statistic.requested_periods),
            Arc::clone(&statistic),
        );
        statistic
    }

    pub fn invalidate(&self, lottery_type: LotteryType) {
        self.entries.write().retain(|(t, _), _| *t != lottery_type);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads windows from the store and serves cached statistics where possible.
pub struct StatisticsEngine {
    store: Arc<DrawStore>,
    cache: Arc<StatsCache>,
}

impl StatisticsEngine {
    pub fn new(store: Arc<DrawStore>, cache: Arc<StatsCache>) -> Self {
        Self { store, cache }
    }

    pub fn analyze(
        &self,
        lottery_type: LotteryType,
        window: usize,
    ) -> Result<Arc<NumberStatistic>> {
        let window = bound_window(window);
        let draws = self.store.range(lottery_type, window)?;
        let latest_period = draws.first().map(|d| d.period.as_str());

        if let Some(hit) = self.cache.get(lottery_type, window, latest_period) {
            debug!("{}: statistics cache hit for window {}", lottery_type, window);
            return Ok(hit);
        }

        Ok(self.cache.insert(compute_statistic(lottery_type, &draws, window)))
    }
}
