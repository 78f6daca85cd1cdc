use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LotteryError, Result};

pub const DEFAULT_API_URL: &str =
    "https://www.cwl.gov.cn/cwl_admin/front/cwlkj/search/kjxx/findDrawNotice";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub fetch_timeout_secs: u64,
    /// Periods fetched by an automatic refresh when the caller gives a smaller hint.
    pub default_sync_periods: usize,
    pub max_fetch_periods: usize,
    /// Statistics window behind the weighted recommendation strategies.
    pub analysis_periods: usize,
    /// Sets generated per strategy at every backtest position.
    pub backtest_sets: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "data/lottery.db".to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            fetch_timeout_secs: 30,
            default_sync_periods: 10,
            max_fetch_periods: 600,
            analysis_periods: 30,
            backtest_sets: 5,
        }
    }
}

impl Config {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Config {
            database_url: lookup("SWLC_DB_PATH").unwrap_or(defaults.database_url),
            api_base_url: lookup("SWLC_API_URL").unwrap_or(defaults.api_base_url),
            fetch_timeout_secs: parse_or(
                &lookup,
                "SWLC_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout_secs,
            )?,
            default_sync_periods: parse_or(
                &lookup,
                "SWLC_SYNC_PERIODS",
                defaults.default_sync_periods,
            )?,
            max_fetch_periods: parse_or(
                &lookup,
                "SWLC_MAX_FETCH_PERIODS",
                defaults.max_fetch_periods,
            )?,
            analysis_periods: parse_or(
                &lookup,
                "SWLC_ANALYSIS_PERIODS",
                defaults.analysis_periods,
            )?,
            backtest_sets: parse_or(&lookup, "SWLC_BACKTEST_SETS", defaults.backtest_sets)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LotteryError::Config(format!("{} has invalid value {:?}", key, raw))),
        None => Ok(default),
    }
}

pub fn load() -> Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|key| env::var(key).ok())
}
