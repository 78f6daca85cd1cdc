//! Synthetic draws and a scripted draw source shared by the unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::api::DrawSource;
use crate::error::FetchError;
use crate::freshness::FixedClock;
use crate::lottery::LotteryType;
use crate::types::{DrawResult, RawDraw};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Noon in Beijing on `day`.
pub fn clock_on(day: NaiveDate) -> FixedClock {
    let noon = day.and_hms_opt(4, 0, 0).unwrap();
    FixedClock(Utc.from_utc_datetime(&noon))
}

/// Valid numbers for the `index`-th synthetic draw of a type.
pub fn synthetic_numbers(lottery_type: LotteryType, index: usize) -> (Vec<u8>, Vec<u8>) {
    let i = index;
    match lottery_type {
        LotteryType::Ssq => (
            (0..6).map(|k| ((i * 7 + k * 5) % 33) as u8 + 1).collect(),
            vec![(i % 16) as u8 + 1],
        ),
        LotteryType::Fc3d => ((0..3).map(|k| ((i + k * 3) % 10) as u8).collect(), vec![]),
        LotteryType::Qlc => (
            (0..7).map(|k| ((i * 3 + k * 4) % 30) as u8 + 1).collect(),
            vec![((i * 3 + 2) % 30) as u8 + 1],
        ),
        LotteryType::Kl8 => ((0..20).map(|k| ((i * 3 + k * 4) % 80) as u8 + 1).collect(), vec![]),
    }
}

fn period_of(index: usize) -> String {
    format!("{}", 2025_900 - index)
}

/// A draw `index` places before the newest one, two days apart.
pub fn draw_with(
    lottery_type: LotteryType,
    index: usize,
    drawn: &[u8],
    special: &[u8],
) -> DrawResult {
    let mut main_numbers = drawn.to_vec();
    main_numbers.sort_unstable();
    DrawResult {
        lottery_type,
        period: period_of(index),
        draw_date: date(2025, 6, 30) - TimeDelta::days(2 * index as i64),
        main_numbers,
        drawn_numbers: drawn.to_vec(),
        special_numbers: special.to_vec(),
        prize_pool: None,
        sales_amount: None,
    }
}

/// `count` valid draws, newest first.
pub fn synthetic_draws(lottery_type: LotteryType, count: usize) -> Vec<DrawResult> {
    (0..count)
        .map(|i| {
            let (main, special) = synthetic_numbers(lottery_type, i);
            draw_with(lottery_type, i, &main, &special)
        })
        .collect()
}

/// `count` raw records, newest first, the newest drawn on `latest`.
pub fn raw_history(lottery_type: LotteryType, count: usize, latest: NaiveDate) -> Vec<RawDraw> {
    let positional = lottery_type.spec().positional;
    let join = |numbers: &[u8]| {
        numbers
            .iter()
            .map(|n| if positional { n.to_string() } else { format!("{:02}", n) })
            .collect::<Vec<_>>()
            .join(",")
    };
    (0..count)
        .map(|i| {
            let (main, special) = synthetic_numbers(lottery_type, i);
            let day = latest - TimeDelta::days(i as i64);
            RawDraw {
                code: period_of(i),
                date: format!("{}(一)", day.format("%Y-%m-%d")),
                red: join(&main),
                blue: (!special.is_empty()).then(|| join(&special)),
                poolmoney: Some("123456789".to_string()),
                sales: Some("98765432".to_string()),
            }
        })
        .collect()
}

#[derive(Default)]
pub struct FakeSource {
    history: HashMap<LotteryType, Vec<RawDraw>>,
    delay: Duration,
    failing: bool,
    calls: AtomicUsize,
    requested: Mutex<Vec<(LotteryType, usize)>>,
}

impl FakeSource {
    /// Serves `count` draws of every type, the newest drawn on `latest`.
    pub fn with_history(count: usize, latest: NaiveDate) -> Self {
        let history = LotteryType::ALL
            .into_iter()
            .map(|t| (t, raw_history(t, count, latest)))
            .collect();
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn with_records(lottery_type: LotteryType, records: Vec<RawDraw>) -> Self {
        Self {
            history: HashMap::from([(lottery_type, records)]),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<(LotteryType, usize)> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl DrawSource for FakeSource {
    async fn fetch_draws(
        &self,
        lottery_type: LotteryType,
        period_count: usize,
    ) -> Result<Vec<RawDraw>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().push((lottery_type, period_count));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(FetchError::Remote {
                state: 1,
                message: "service unavailable".to_string(),
            });
        }
        let draws: Vec<RawDraw> = self
            .history
            .get(&lottery_type)
            .map(|h| h.iter().take(period_count).cloned().collect())
            .unwrap_or_default();
        if draws.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(draws)
    }
}
