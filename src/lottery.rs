use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::LotteryError;

/// The closed set of supported draw types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LotteryType {
    #[serde(rename = "ssq")]
    Ssq,
    #[serde(rename = "3d")]
    Fc3d,
    #[serde(rename = "qlc")]
    Qlc,
    #[serde(rename = "kl8")]
    Kl8,
}

/// Static descriptor of a lottery type's structure and schedule.
#[derive(Debug, Clone, Copy)]
pub struct LotterySpec {
    pub code: &'static str,
    pub name: &'static str,
    pub draw_days: &'static [Weekday],
    pub main_min: u8,
    pub main_max: u8,
    pub main_count: usize,
    pub special_min: u8,
    pub special_max: u8,
    pub special_count: usize,
    /// Special number comes out of the same drum as the main numbers.
    pub special_shares_pool: bool,
    /// Main numbers are ordered digits and may repeat.
    pub positional: bool,
    pub staleness_days: i64,
}

const EVERY_DAY: &[Weekday] = &[
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const SSQ: LotterySpec = LotterySpec {
    code: "ssq",
    name: "双色球",
    draw_days: &[Weekday::Tue, Weekday::Thu, Weekday::Sun],
    main_min: 1,
    main_max: 33,
    main_count: 6,
    special_min: 1,
    special_max: 16,
    special_count: 1,
    special_shares_pool: false,
    positional: false,
    staleness_days: 3,
};

const FC3D: LotterySpec = LotterySpec {
    code: "3d",
    name: "福彩3D",
    draw_days: EVERY_DAY,
    main_min: 0,
    main_max: 9,
    main_count: 3,
    special_min: 0,
    special_max: 0,
    special_count: 0,
    special_shares_pool: false,
    positional: true,
    staleness_days: 1,
};

const QLC: LotterySpec = LotterySpec {
    code: "qlc",
    name: "七乐彩",
    draw_days: &[Weekday::Mon, Weekday::Wed, Weekday::Fri],
    main_min: 1,
    main_max: 30,
    main_count: 7,
    special_min: 1,
    special_max: 30,
    special_count: 1,
    special_shares_pool: true,
    positional: false,
    staleness_days: 3,
};

const KL8: LotterySpec = LotterySpec {
    code: "kl8",
    name: "快乐8",
    draw_days: EVERY_DAY,
    main_min: 1,
    main_max: 80,
    main_count: 20,
    special_min: 0,
    special_max: 0,
    special_count: 0,
    special_shares_pool: false,
    positional: false,
    staleness_days: 1,
};

impl LotteryType {
    pub const ALL: [LotteryType; 4] = [
        LotteryType::Ssq,
        LotteryType::Fc3d,
        LotteryType::Qlc,
        LotteryType::Kl8,
    ];

    pub fn spec(&self) -> &'static LotterySpec {
        match self {
            LotteryType::Ssq => &SSQ,
            LotteryType::Fc3d => &FC3D,
            LotteryType::Qlc => &QLC,
            LotteryType::Kl8 => &KL8,
        }
    }

    pub fn code(&self) -> &'static str {
        self.spec().code
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }
}

impl LotterySpec {
    pub fn main_pool(&self) -> RangeInclusive<u8> {
        self.main_min..=self.main_max
    }

    pub fn special_pool(&self) -> RangeInclusive<u8> {
        self.special_min..=self.special_max
    }

    pub fn main_pool_size(&self) -> usize {
        (self.main_max - self.main_min) as usize + 1
    }

    pub fn has_special(&self) -> bool {
        self.special_count > 0
    }

    /// Numbers scored per draw: main plus special.
    pub fn drawn_count(&self) -> usize {
        self.main_count + self.special_count
    }

    pub fn draws_on(&self, day: Weekday) -> bool {
        self.draw_days.contains(&day)
    }
}

impl fmt::Display for LotteryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for LotteryType {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        LotteryType::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(trimmed) || t.name() == trimmed)
            .ok_or_else(|| LotteryError::InvalidLotteryType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes_and_names() {
        assert_eq!("ssq".parse::<LotteryType>().unwrap(), LotteryType::Ssq);
        assert_eq!("3D".parse::<LotteryType>().unwrap(), LotteryType::Fc3d);
        assert_eq!(" kl8 ".parse::<LotteryType>().unwrap(), LotteryType::Kl8);
        assert_eq!("七乐彩".parse::<LotteryType>().unwrap(), LotteryType::Qlc);
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = "dlt".parse::<LotteryType>().unwrap_err();
        assert!(matches!(err, LotteryError::InvalidLotteryType(ref s) if s == "dlt"));
    }

    #[test]
    fn test_thresholds_follow_cadence() {
        for t in LotteryType::ALL {
            let spec = t.spec();
            if spec.draw_days.len() == 7 {
                assert_eq!(spec.staleness_days, 1, "{t}");
            } else {
                assert_eq!(spec.staleness_days, 3, "{t}");
            }
        }
    }

    #[test]
    fn test_pool_sizes() {
        assert_eq!(LotteryType::Ssq.spec().main_pool_size(), 33);
        assert_eq!(LotteryType::Fc3d.spec().main_pool_size(), 10);
        assert_eq!(LotteryType::Kl8.spec().drawn_count(), 20);
        assert_eq!(LotteryType::Qlc.spec().drawn_count(), 8);
        assert!(LotteryType::Ssq.spec().draws_on(Weekday::Sun));
        assert!(!LotteryType::Ssq.spec().draws_on(Weekday::Mon));
    }

    #[test]
    fn test_serde_uses_codes() {
        assert_eq!(serde_json::to_string(&LotteryType::Fc3d).unwrap(), "\"3d\"");
        let t: LotteryType = serde_json::from_str("\"qlc\"").unwrap();
        assert_eq!(t, LotteryType::Qlc);
    }
}
