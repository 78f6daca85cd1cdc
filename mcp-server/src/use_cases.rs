use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use swlc::recommend::RecommendedSet;
use swlc::utils::{format_amount, format_date, format_numbers};
use swlc::{DrawResult, FreshnessOutcome, LotteryError, LotteryService, LotteryType, Strategy};

pub const DEFAULT_HISTORY_PERIODS: usize = 10;
pub const DEFAULT_ANALYSIS_PERIODS: usize = 30;
pub const DEFAULT_BACKTEST_WINDOW: usize = 100;
pub const DEFAULT_BACKTEST_STEP: usize = 50;
pub const DEFAULT_SYNC_PERIODS: usize = 10;

pub struct LotteryUseCase {
    service: Arc<LotteryService>,
}

impl LotteryUseCase {
    pub fn new(service: Arc<LotteryService>) -> Self {
        Self { service }
    }

    pub async fn get_latest(&self, lottery_type: LotteryType) -> Result<String> {
        let served = self.service.latest(lottery_type).await?;

        let mut body = json!({
            "success": true,
            "lottery_type": lottery_type,
            "name": lottery_type.name(),
            "freshness": served.freshness,
            "result": served.data.as_ref().map(draw_json),
        });
        if served.data.is_none() {
            body["message"] = json!("no draws stored yet");
        }
        Ok(body.to_string())
    }

    pub async fn get_latest_result(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        self.get_latest(lottery_type).await
    }

    pub async fn get_historical_data(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let periods = usize_arg(arguments, "periods", DEFAULT_HISTORY_PERIODS, 1, 500)?;
        let served = self.service.history(lottery_type, periods).await?;

        Ok(json!({
            "success": true,
            "lottery_type": lottery_type,
            "freshness": served.freshness,
            "requested_periods": periods,
            "returned_periods": served.data.len(),
            "results": served.data.iter().map(draw_json).collect::<Vec<_>>(),
        })
        .to_string())
    }

    pub async fn analyze_numbers(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let periods = usize_arg(arguments, "periods", DEFAULT_ANALYSIS_PERIODS, 5, 500)?;
        let served = self.service.analyze(lottery_type, periods).await?;

        Ok(json!({
            "success": true,
            "freshness": served.freshness,
            "statistics": &*served.data,
        })
        .to_string())
    }

    pub async fn generate_random_numbers(
        &self,
        arguments: &HashMap<String, Value>,
    ) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let count = usize_arg(arguments, "count", 1, 1, 10)?;
        let seed = seed_arg(arguments)?;
        let served = self
            .service
            .recommend(lottery_type, count, Strategy::UniformRandom, seed)
            .await?;

        Ok(json!({
            "success": true,
            "lottery_type": lottery_type,
            "freshness": served.freshness,
            "sets": served.data.iter().map(set_json).collect::<Vec<_>>(),
        })
        .to_string())
    }

    pub async fn generate_recommendations(
        &self,
        arguments: &HashMap<String, Value>,
    ) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let count = usize_arg(arguments, "count", 1, 1, 10)?;
        let strategy = match arguments.get("strategy") {
            None | Some(Value::Null) => Strategy::Balanced,
            Some(Value::String(s)) => s.parse::<Strategy>()?,
            Some(_) => {
                return Err(LotteryError::invalid_parameter("strategy", "expected a string").into());
            }
        };
        let seed = seed_arg(arguments)?;
        let served = self.service.recommend(lottery_type, count, strategy, seed).await?;

        Ok(json!({
            "success": true,
            "lottery_type": lottery_type,
            "strategy": strategy,
            "freshness": served.freshness,
            "sets": served.data.iter().map(set_json).collect::<Vec<_>>(),
            "disclaimer": "Draws are random; recommendations do not improve the odds.",
        })
        .to_string())
    }

    pub async fn run_backtest(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let window = usize_arg(arguments, "window_size", DEFAULT_BACKTEST_WINDOW, 50, 500)?;
        let step = usize_arg(arguments, "step", DEFAULT_BACKTEST_STEP, 10, 100)?;
        let seed = seed_arg(arguments)?;
        let served = self.service.backtest(lottery_type, window, step, seed).await?;

        let report = &served.data;
        let mut body = json!({
            "success": true,
            "freshness": served.freshness,
            "report": report,
        });
        if report.total_periods_tested == 0 {
            body["message"] = json!(format!(
                "insufficient data: {} periods stored, at least {} needed",
                report.available_periods,
                report.window_size + report.step
            ));
        }
        Ok(body.to_string())
    }

    pub async fn sync_lottery_data(&self, arguments: &HashMap<String, Value>) -> Result<String> {
        let lottery_type = lottery_type_arg(arguments)?;
        let periods = usize_arg(arguments, "periods", DEFAULT_SYNC_PERIODS, 1, 50)?;
        let report = self.service.sync(lottery_type, periods).await?;

        Ok(json!({
            "success": report.outcome == FreshnessOutcome::Refreshed,
            "report": report,
        })
        .to_string())
    }

    pub async fn get_database_info(&self, _arguments: &HashMap<String, Value>) -> Result<String> {
        let info = self.service.database_info()?;

        Ok(json!({
            "success": true,
            "info": info,
        })
        .to_string())
    }
}

fn draw_json(draw: &DrawResult) -> Value {
    let positional = draw.lottery_type.spec().positional;
    json!({
        "period": draw.period,
        "draw_date": format_date(draw.draw_date),
        "main_numbers": draw.main_numbers,
        "drawn_numbers": draw.drawn_numbers,
        "special_numbers": draw.special_numbers,
        "display": display(&draw.drawn_numbers, &draw.special_numbers, positional),
        "prize_pool": draw.prize_pool.as_deref().map(format_amount),
        "sales_amount": draw.sales_amount.as_deref().map(format_amount),
    })
}

fn set_json(set: &RecommendedSet) -> Value {
    let positional = set.lottery_type.spec().positional;
    json!({
        "strategy": set.strategy,
        "main_numbers": set.main_numbers,
        "special_numbers": set.special_numbers,
        "display": display(&set.main_numbers, &set.special_numbers, positional),
        "statistics_window": set.statistics_window,
    })
}

fn display(main: &[u8], special: &[u8], positional: bool) -> String {
    if special.is_empty() {
        format_numbers(main, positional)
    } else {
        format!(
            "{} + {}",
            format_numbers(main, positional),
            format_numbers(special, positional)
        )
    }
}

fn lottery_type_arg(arguments: &HashMap<String, Value>) -> Result<LotteryType> {
    let raw = arguments
        .get("lottery_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LotteryError::invalid_parameter("lottery_type", "missing or not a string"))?;
    Ok(raw.parse::<LotteryType>()?)
}

/// Optional integer argument, clamped into `min..=max`.
fn usize_arg(
    arguments: &HashMap<String, Value>,
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize> {
    match arguments.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let n = value
                .as_i64()
                .ok_or_else(|| LotteryError::invalid_parameter(name, "expected an integer"))?;
            Ok(n.clamp(min as i64, max as i64) as usize)
        }
    }
}

fn seed_arg(arguments: &HashMap<String, Value>) -> Result<Option<u64>> {
    match arguments.get("seed") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value.as_u64().ok_or_else(|| {
            LotteryError::invalid_parameter("seed", "expected a non-negative integer")
        })?)),
    }
}
