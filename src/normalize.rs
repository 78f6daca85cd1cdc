use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::lottery::LotteryType;
use crate::types::{DrawResult, RawDraw};
use crate::utils::parse_draw_date;

/// Why a fetched record was refused.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("period {0:?} is not a digit string")]
    BadPeriod(String),

    #[error("unparseable draw date {0:?}")]
    BadDate(String),

    #[error("unparseable number {0:?}")]
    BadNumber(String),

    #[error("expected {expected} {kind} numbers, got {actual}")]
    WrongCount {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} number {number} outside {min}-{max}")]
    OutOfRange {
        kind: &'static str,
        number: u8,
        min: u8,
        max: u8,
    },

    #[error("duplicate {kind} number {number}")]
    Duplicate { kind: &'static str, number: u8 },
}

/// Validates one raw record against the type's structural invariants.
pub fn normalize(lottery_type: LotteryType, raw: &RawDraw) -> Result<DrawResult, RecordError> {
    let spec = lottery_type.spec();

    let period = raw.code.trim();
    if period.is_empty() || !period.chars().all(|c| c.is_ascii_digit()) {
        return Err(RecordError::BadPeriod(raw.code.clone()));
    }

    let draw_date =
        parse_draw_date(&raw.date).ok_or_else(|| RecordError::BadDate(raw.date.clone()))?;

    let drawn_numbers = parse_numbers(&raw.red)?;
    check_numbers(
        "main",
        &drawn_numbers,
        spec.main_count,
        spec.main_min,
        spec.main_max,
        !spec.positional,
    )?;

    let special_numbers = match raw.blue.as_deref() {
        Some(blue) if spec.has_special() => parse_numbers(blue)?,
        _ => Vec::new(),
    };
    check_numbers(
        "special",
        &special_numbers,
        spec.special_count,
        spec.special_min,
        spec.special_max,
        true,
    )?;
    if spec.special_shares_pool {
        if let Some(&number) = special_numbers.iter().find(|n| drawn_numbers.contains(n)) {
            return Err(RecordError::Duplicate {
                kind: "special",
                number,
            });
        }
    }

    let mut main_numbers = drawn_numbers.clone();
    main_numbers.sort_unstable();

    Ok(DrawResult {
        lottery_type,
        period: period.to_string(),
        draw_date,
        main_numbers,
        drawn_numbers,
        special_numbers,
        prize_pool: non_empty(raw.poolmoney.as_deref()),
        sales_amount: non_empty(raw.sales.as_deref()),
    })
}

/// Splits a fetched batch into valid draws and rejected periods.
pub fn normalize_batch(
    lottery_type: LotteryType,
    raws: &[RawDraw],
) -> (Vec<DrawResult>, Vec<(String, RecordError)>) {
    let mut accepted = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();
    for raw in raws {
        match normalize(lottery_type, raw) {
            Ok(draw) => accepted.push(draw),
            Err(e) => {
                warn!("{}: rejecting period {:?}: {}", lottery_type, raw.code, e);
                rejected.push((raw.code.clone(), e));
            }
        }
    }
    (accepted, rejected)
}

fn parse_numbers(raw: &str) -> Result<Vec<u8>, RecordError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>().map_err(|_| RecordError::BadNumber(s.to_string())))
        .collect()
}

fn check_numbers(
    kind: &'static str,
    numbers: &[u8],
    expected: usize,
    min: u8,
    max: u8,
    distinct: bool,
) -> Result<(), RecordError> {
    if numbers.len() != expected {
        return Err(RecordError::WrongCount {
            kind,
            expected,
            actual: numbers.len(),
        });
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    for &number in numbers {
        if number < min || number > max {
            return Err(RecordError::OutOfRange {
                kind,
                number,
                min,
                max,
            });
        }
        if distinct && !seen.insert(number) {
            return Err(RecordError::Duplicate { kind, number });
        }
    }
    Ok(())
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
