//! 月份與頻率運算。所有月序列都以每月 1 日作為索引。

use crate::utils::error::{ForecastError, Result};
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn is_month_start(date: NaiveDate) -> bool {
    date.day() == 1
}

pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| ForecastError::data(format!("date overflow adding {} months to {}", months, date)))
}

pub fn sub_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| ForecastError::data(format!("date overflow subtracting {} months from {}", months, date)))
}

/// 下一個月的 1 日。
pub fn next_month_start(date: NaiveDate) -> Result<NaiveDate> {
    add_months(month_start(date), 1)
}

/// 不是月初的日期往後推到下一個月初 (月初頻率的日期對齊規則)。
pub fn roll_forward_month_start(date: NaiveDate) -> Result<NaiveDate> {
    if is_month_start(date) {
        Ok(date)
    } else {
        next_month_start(date)
    }
}

/// 從 `start` 起連續 `periods` 個月初。
pub fn monthly_range(start: NaiveDate, periods: usize) -> Result<Vec<NaiveDate>> {
    Frequency::MonthStart.range(start, periods)
}

/// 未來日期的產生頻率。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Frequency {
    #[default]
    #[serde(rename = "MS")]
    MonthStart,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "D")]
    Daily,
}

impl Frequency {
    pub fn step(self, date: NaiveDate) -> Result<NaiveDate> {
        match self {
            Frequency::MonthStart => next_month_start(date),
            Frequency::Weekly => date
                .checked_add_signed(Duration::days(7))
                .ok_or_else(|| ForecastError::data(format!("date overflow after {}", date))),
            Frequency::Daily => date
                .succ_opt()
                .ok_or_else(|| ForecastError::data(format!("date overflow after {}", date))),
        }
    }

    /// 對齊到此頻率的第一個有效日期。
    pub fn align(self, date: NaiveDate) -> Result<NaiveDate> {
        match self {
            Frequency::MonthStart => roll_forward_month_start(date),
            Frequency::Weekly | Frequency::Daily => Ok(date),
        }
    }

    pub fn range(self, start: NaiveDate, periods: usize) -> Result<Vec<NaiveDate>> {
        let mut dates = Vec::with_capacity(periods);
        if periods == 0 {
            return Ok(dates);
        }
        let mut current = self.align(start)?;
        dates.push(current);
        for _ in 1..periods {
            current = self.step(current)?;
            dates.push(current);
        }
        Ok(dates)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::MonthStart => "MS",
            Frequency::Weekly => "W",
            Frequency::Daily => "D",
        }
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "MS" => Ok(Frequency::MonthStart),
            "W" => Ok(Frequency::Weekly),
            "D" => Ok(Frequency::Daily),
            other => Err(ForecastError::InvalidConfigValueError {
                field: "freq".to_string(),
                value: other.to_string(),
                reason: "Supported frequencies: MS, W, D".to_string(),
            }),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
