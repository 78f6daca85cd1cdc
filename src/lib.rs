//! Lottery draw results for the China Welfare Lottery games (ssq, 3d, qlc,
//! kl8): a local SQLite store kept fresh on demand from the official
//! draw-notice endpoint, plus statistics, recommendations and backtests
//! computed from the stored draws.

pub mod api;
pub mod backtest;
pub mod config;
pub mod database;
pub mod error;
pub mod freshness;
pub mod lottery;
pub mod normalize;
pub mod recommend;
pub mod service;
pub mod stats;
pub mod sync;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use error::{FetchError, LotteryError, Result};
pub use lottery::LotteryType;
pub use recommend::Strategy;
pub use service::{LotteryService, Served};
pub use types::{DrawResult, FreshnessOutcome, SyncReport};
