use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::database::DrawStore;
use crate::error::Result;
use crate::lottery::LotteryType;
use crate::recommend::{RecommendedSet, Strategy, generate_sets};
use crate::stats::compute_statistic;
use crate::types::DrawResult;

pub const MIN_WINDOW: usize = 50;
pub const MAX_WINDOW: usize = 500;
pub const MIN_STEP: usize = 10;
pub const MAX_STEP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyAccuracy {
    pub strategy: Strategy,
    pub accuracy: f64,
}

/// One scored replay position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestWindow {
    pub start_index: usize,
    pub first_period: String,
    pub last_period: String,
    pub target_period: String,
    pub results: Vec<StrategyAccuracy>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyPerformance {
    pub strategy: Strategy,
    pub average_accuracy: f64,
    pub best_accuracy: f64,
    pub worst_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub lottery_type: LotteryType,
    pub window_size: usize,
    pub step: usize,
    pub sets_per_strategy: usize,
    pub available_periods: usize,
    pub total_periods_tested: usize,
    pub average_accuracy: f64,
    pub best_strategy: Option<Strategy>,
    pub strategy_performance: Vec<StrategyPerformance>,
    pub windows: Vec<BacktestWindow>,
}

/// Fraction of the target's drawn numbers a set matched. Positional types
/// only count digits in the right position.
pub fn score_set(set: &RecommendedSet, target: &DrawResult) -> f64 {
    let spec = target.lottery_type.spec();
    let main_hits = if spec.positional {
        set.main_numbers
            .iter()
            .zip(&target.drawn_numbers)
            .filter(|(a, b)| a == b)
            .count()
    } else {
        set.main_numbers
            .iter()
            .filter(|n| target.main_numbers.contains(n))
            .count()
    };
    let special_hits = set
        .special_numbers
        .iter()
        .filter(|n| target.special_numbers.contains(n))
        .count();

    (main_hits + special_hits) as f64 / spec.drawn_count() as f64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Replays `history` (oldest first). A position starting at `s` is scored
/// only when `s + window_size + step` draws are available; its statistics
/// come from `[s, s + window_size)` and its target is draw `s + window_size`.
pub fn run_backtest<R: Rng>(
    lottery_type: LotteryType,
    history: &[DrawResult],
    window_size: usize,
    step: usize,
    sets_per_strategy: usize,
    rng: &mut R,
) -> BacktestReport {
    let window_size = window_size.clamp(MIN_WINDOW, MAX_WINDOW);
    let step = step.clamp(MIN_STEP, MAX_STEP);
    let sets_per_strategy = sets_per_strategy.max(1);
    let n = history.len();

    let mut windows = Vec::new();
    let mut per_strategy: Vec<Vec<f64>> = vec![Vec::new(); Strategy::ALL.len()];

    let mut start = 0;
    while start + window_size + step <= n {
        let sample = &history[start..start + window_size];
        let target = &history[start + window_size];

        let newest_first: Vec<DrawResult> = sample.iter().rev().cloned().collect();
        let stats = compute_statistic(lottery_type, &newest_first, window_size);

        let mut results = Vec::with_capacity(Strategy::ALL.len());
        for (i, strategy) in Strategy::ALL.into_iter().enumerate() {
            let scores: Vec<f64> =
                generate_sets(lottery_type, sets_per_strategy, strategy, Some(&stats), rng)
                    .iter()
                    .map(|set| score_set(set, target))
                    .collect();
            let accuracy = mean(&scores);
            per_strategy[i].push(accuracy);
            results.push(StrategyAccuracy { strategy, accuracy });
        }

        windows.push(BacktestWindow {
            start_index: start,
            first_period: sample[0].period.clone(),
            last_period: sample[window_size - 1].period.clone(),
            target_period: target.period.clone(),
            results,
        });
        start += step;
    }

    let strategy_performance: Vec<StrategyPerformance> = Strategy::ALL
        .into_iter()
        .zip(&per_strategy)
        .map(|(strategy, scores)| StrategyPerformance {
            strategy,
            average_accuracy: mean(scores),
            best_accuracy: scores.iter().copied().fold(0.0, f64::max),
            worst_accuracy: if scores.is_empty() {
                0.0
            } else {
                scores.iter().copied().fold(f64::INFINITY, f64::min)
            },
        })
        .collect();

    let all_scores: Vec<f64> = per_strategy.iter().flatten().copied().collect();
    let best_strategy = if windows.is_empty() {
        None
    } else {
        // strict comparison keeps the first strategy on ties
        let mut best = &strategy_performance[0];
        for candidate in &strategy_performance[1..] {
            if candidate.average_accuracy > best.average_accuracy {
                best = candidate;
            }
        }
        Some(best.strategy)
    };

    BacktestReport {
        lottery_type,
        window_size,
        step,
        sets_per_strategy,
        available_periods: n,
        total_periods_tested: windows.len(),
        average_accuracy: mean(&all_scores),
        best_strategy,
        strategy_performance,
        windows,
    }
}

pub struct BacktestEngine {
    store: Arc<DrawStore>,
    sets_per_strategy: usize,
}

impl BacktestEngine {
    pub fn new(store: Arc<DrawStore>, sets_per_strategy: usize) -> Self {
        Self {
            store,
            sets_per_strategy,
        }
    }

    pub fn run(
        &self,
        lottery_type: LotteryType,
        window_size: usize,
        step: usize,
        seed: Option<u64>,
    ) -> Result<BacktestReport> {
        let history = self.store.history(lottery_type)?;
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let report = run_backtest(
            lottery_type,
            &history,
            window_size,
            step,
            self.sets_per_strategy,
            &mut rng,
        );
        info!(
            "{}: backtest window={} step={} tested {} of {} periods, best {:?}",
            lottery_type,
            report.window_size,
            report.step,
            report.total_periods_tested,
            report.available_periods,
            report.best_strategy
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draw_with, synthetic_draws};

    fn oldest_first(lottery_type: LotteryType, count: usize) -> Vec<DrawResult> {
        let mut draws = synthetic_draws(lottery_type, count);
        draws.reverse();
        draws
    }

    #[test]
    fn test_fifty_periods_is_not_enough() {
        let history = oldest_first(LotteryType::Ssq, 50);
        let mut rng = StdRng::seed_from_u64(1);
        let report = run_backtest(LotteryType::Ssq, &history, 50, 25, 5, &mut rng);
        assert_eq!(report.total_periods_tested, 0);
        assert_eq!(report.best_strategy, None);
        assert_eq!(report.average_accuracy, 0.0);
        assert!(report.windows.is_empty());
    }

    #[test]
    fn test_seventy_six_periods_tests_one_window() {
        let history = oldest_first(LotteryType::Ssq, 76);
        let mut rng = StdRng::seed_from_u64(1);
        let report = run_backtest(LotteryType::Ssq, &history, 50, 25, 5, &mut rng);
        assert_eq!(report.total_periods_tested, 1);
        assert_eq!(report.windows[0].start_index, 0);
        assert_eq!(report.windows[0].target_period, history[50].period);
        assert_eq!(report.windows[0].results.len(), Strategy::ALL.len());
        assert!(report.best_strategy.is_some());
        assert!((0.0..=1.0).contains(&report.average_accuracy));
    }

    #[test]
    fn test_parameters_are_clamped() {
        let history = oldest_first(LotteryType::Kl8, 120);
        let mut rng = StdRng::seed_from_u64(2);
        let report = run_backtest(LotteryType::Kl8, &history, 10, 1, 2, &mut rng);
        assert_eq!(report.window_size, MIN_WINDOW);
        assert_eq!(report.step, MIN_STEP);
        // starts 0..=60 step 10
        assert_eq!(report.total_periods_tested, 7);
    }

    #[test]
    fn test_score_set() {
        let target = draw_with(LotteryType::Ssq, 0, &[1, 2, 3, 4, 5, 6], &[7]);
        let set = RecommendedSet {
            lottery_type: LotteryType::Ssq,
            strategy: Strategy::UniformRandom,
            main_numbers: vec![1, 2, 10, 11, 12, 13],
            special_numbers: vec![7],
            statistics_window: None,
        };
        assert!((score_set(&set, &target) - 3.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_positional_score_needs_matching_position() {
        let target = draw_with(LotteryType::Fc3d, 0, &[1, 2, 3], &[]);
        let set = RecommendedSet {
            lottery_type: LotteryType::Fc3d,
            strategy: Strategy::UniformRandom,
            main_numbers: vec![1, 3, 2],
            special_numbers: vec![],
            statistics_window: None,
        };
        assert!((score_set(&set, &target) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_spans_strategies_and_positions() {
        let history = oldest_first(LotteryType::Qlc, 150);
        let mut rng = StdRng::seed_from_u64(4);
        let report = run_backtest(LotteryType::Qlc, &history, 50, 50, 3, &mut rng);
        assert_eq!(report.total_periods_tested, 2);
        let expected: f64 = report
            .windows
            .iter()
            .flat_map(|w| w.results.iter().map(|r| r.accuracy))
            .sum::<f64>()
            / 8.0;
        assert!((report.average_accuracy - expected).abs() < 1e-9);
        let best = report.best_strategy.unwrap();
        let best_avg = report
            .strategy_performance
            .iter()
            .find(|p| p.strategy == best)
            .unwrap()
            .average_accuracy;
        for p in &report.strategy_performance {
            assert!(p.average_accuracy <= best_avg);
        }
    }

    #[test]
    fn test_engine_reads_history_from_store() {
        let store = Arc::new(DrawStore::open_in_memory().unwrap());
        store.upsert(LotteryType::Fc3d, &synthetic_draws(LotteryType::Fc3d, 76)).unwrap();
        let engine = BacktestEngine::new(store, 5);
        let report = engine.run(LotteryType::Fc3d, 50, 25, Some(8)).unwrap();
        assert_eq!(report.total_periods_tested, 1);
        assert_eq!(report, engine.run(LotteryType::Fc3d, 50, 25, Some(8)).unwrap());
    }
}
