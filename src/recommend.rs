use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{LotteryError, Result};
use crate::lottery::LotteryType;
use crate::stats::{NumberStatistic, StatisticsEngine};

pub const MIN_SETS: usize = 1;
pub const MAX_SETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    UniformRandom,
    HotWeighted,
    ColdWeighted,
    Balanced,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::UniformRandom,
        Strategy::HotWeighted,
        Strategy::ColdWeighted,
        Strategy::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::UniformRandom => "uniform_random",
            Strategy::HotWeighted => "hot_weighted",
            Strategy::ColdWeighted => "cold_weighted",
            Strategy::Balanced => "balanced",
        }
    }

    /// Whether the strategy needs frequency statistics.
    pub fn is_weighted(&self) -> bool {
        !matches!(self, Strategy::UniformRandom)
    }

    fn main_weight(&self, pick: usize, main_count: usize, frequency: u32) -> f64 {
        let f = frequency as f64;
        match self {
            Strategy::UniformRandom => 1.0,
            Strategy::HotWeighted => f + 1.0,
            Strategy::ColdWeighted => 1.0 / (f + 1.0),
            Strategy::Balanced if pick < main_count / 2 => f + 1.0,
            Strategy::Balanced => 1.0,
        }
    }

    fn special_weight(&self, frequency: u32) -> f64 {
        let f = frequency as f64;
        match self {
            Strategy::HotWeighted => f + 1.0,
            Strategy::ColdWeighted => 1.0 / (f + 1.0),
            Strategy::UniformRandom | Strategy::Balanced => 1.0,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s.trim())
            .ok_or_else(|| {
                LotteryError::invalid_parameter(
                    "strategy",
                    format!(
                        "unknown strategy {:?} (expected uniform_random, hot_weighted, cold_weighted or balanced)",
                        s
                    ),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedSet {
    pub lottery_type: LotteryType,
    pub strategy: Strategy,
    /// Ascending, or in position order for positional types.
    pub main_numbers: Vec<u8>,
    pub special_numbers: Vec<u8>,
    /// Periods behind the weights, for weighted strategies.
    pub statistics_window: Option<usize>,
}

/// Generates `count` (clamped to 1..=10) sets. Weighted strategies read
/// their weights from `stats`; without statistics every number weighs the
/// same.
pub fn generate_sets<R: Rng>(
    lottery_type: LotteryType,
    count: usize,
    strategy: Strategy,
    stats: Option<&NumberStatistic>,
    rng: &mut R,
) -> Vec<RecommendedSet> {
    let count = count.clamp(MIN_SETS, MAX_SETS);
    let stats = stats.filter(|_| strategy.is_weighted());
    (0..count)
        .map(|_| generate_one(lottery_type, strategy, stats, rng))
        .collect()
}

fn generate_one<R: Rng>(
    lottery_type: LotteryType,
    strategy: Strategy,
    stats: Option<&NumberStatistic>,
    rng: &mut R,
) -> RecommendedSet {
    let spec = lottery_type.spec();
    let main_frequency = |n: u8| stats.map(|s| s.main_count_of(n)).unwrap_or(0);
    let special_frequency = |n: u8| stats.map(|s| s.special_count_of(n)).unwrap_or(0);

    let mut available: Vec<u8> = spec.main_pool().collect();
    let mut main_numbers = Vec::with_capacity(spec.main_count);
    for pick in 0..spec.main_count {
        let weights: Vec<f64> = available
            .iter()
            .map(|&n| strategy.main_weight(pick, spec.main_count, main_frequency(n)))
            .collect();
        let idx = pick_index(&weights, rng);
        if spec.positional {
            main_numbers.push(available[idx]);
        } else {
            main_numbers.push(available.remove(idx));
        }
    }
    if !spec.positional {
        main_numbers.sort_unstable();
    }

    let mut special_pool: Vec<u8> = spec
        .special_pool()
        .filter(|n| !spec.special_shares_pool || !main_numbers.contains(n))
        .collect();
    let mut special_numbers = Vec::with_capacity(spec.special_count);
    for _ in 0..spec.special_count {
        if special_pool.is_empty() {
            break;
        }
        let weights: Vec<f64> = special_pool
            .iter()
            .map(|&n| strategy.special_weight(special_frequency(n)))
            .collect();
        let idx = pick_index(&weights, rng);
        special_numbers.push(special_pool.remove(idx));
    }
    special_numbers.sort_unstable();

    RecommendedSet {
        lottery_type,
        strategy,
        main_numbers,
        special_numbers,
        statistics_window: stats.map(|s| s.analysis_periods),
    }
}

fn pick_index<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    match WeightedIndex::new(weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.random_range(0..weights.len()),
    }
}

pub struct RecommendationEngine {
    stats: Arc<StatisticsEngine>,
    window: usize,
}

impl RecommendationEngine {
    pub fn new(stats: Arc<StatisticsEngine>, window: usize) -> Self {
        Self { stats, window }
    }

    pub fn generate(
        &self,
        lottery_type: LotteryType,
        count: usize,
        strategy: Strategy,
        seed: Option<u64>,
    ) -> Result<Vec<RecommendedSet>> {
        let stats = if strategy.is_weighted() {
            Some(self.stats.analyze(lottery_type, self.window)?)
        } else {
            None
        };
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(generate_sets(lottery_type, count, strategy, stats.as_deref(), &mut rng))
    }
}
