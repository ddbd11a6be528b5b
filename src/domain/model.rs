use crate::domain::calendar::{is_month_start, next_month_start};
use crate::utils::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 原始資料的一筆日紀錄 (日期 + 當日總量)。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// 月序列：索引為每月 1 日，嚴格遞增且中間沒有缺月。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct TimeSeries {
    observations: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        for obs in &observations {
            if !is_month_start(obs.date) {
                return Err(ForecastError::data(format!(
                    "{} is not the first day of a month",
                    obs.date
                )));
            }
        }
        for pair in observations.windows(2) {
            let expected = next_month_start(pair[0].date)?;
            if pair[1].date != expected {
                return Err(ForecastError::data(format!(
                    "monthly index is not contiguous: {} is followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }
        Ok(Self { observations })
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(date, value)| Observation { date, value })
                .collect(),
        )
    }

    /// 從第一個月起依序填入 `values`。
    pub fn from_values(start: NaiveDate, values: &[f64]) -> Result<Self> {
        let dates = crate::domain::calendar::monthly_range(start, values.len())?;
        Self::from_pairs(dates.into_iter().zip(values.iter().copied()))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        self.observations
            .binary_search_by(|o| o.date.cmp(&date))
            .ok()
            .map(|i| self.observations[i].value)
    }

    /// 保留日期 <= `cutoff` 的部分。
    pub fn until(&self, cutoff: NaiveDate) -> TimeSeries {
        TimeSeries {
            observations: self
                .observations
                .iter()
                .copied()
                .filter(|o| o.date <= cutoff)
                .collect(),
        }
    }

    /// 保留日期 >= `start` 的部分。
    pub fn since(&self, start: NaiveDate) -> TimeSeries {
        TimeSeries {
            observations: self
                .observations
                .iter()
                .copied()
                .filter(|o| o.date >= start)
                .collect(),
        }
    }

    /// 逐筆計算新數值，日期索引不變。
    pub fn map_values<F>(&self, f: F) -> TimeSeries
    where
        F: Fn(&Observation) -> f64,
    {
        TimeSeries {
            observations: self
                .observations
                .iter()
                .map(|o| Observation {
                    date: o.date,
                    value: f(o),
                })
                .collect(),
        }
    }
}

impl TryFrom<Vec<Observation>> for TimeSeries {
    type Error = ForecastError;

    fn try_from(observations: Vec<Observation>) -> Result<Self> {
        TimeSeries::new(observations)
    }
}

impl From<TimeSeries> for Vec<Observation> {
    fn from(series: TimeSeries) -> Self {
        series.observations
    }
}

/// 單一月份 (1-12) 的離群值界線。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthBounds {
    pub month: u32,
    pub count: usize,
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
    pub median: f64,
}

impl MonthBounds {
    /// 數值嚴格落在 [lower, upper] 之外才算離群。
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// 每次處理時重新計算，不保存。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutlierBounds {
    months: BTreeMap<u32, MonthBounds>,
}

impl OutlierBounds {
    pub fn new(months: BTreeMap<u32, MonthBounds>) -> Self {
        Self { months }
    }

    pub fn for_month(&self, month: u32) -> Option<&MonthBounds> {
        self.months.get(&month)
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&MonthBounds> {
        self.for_month(date.month())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonthBounds> {
        self.months.values()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// 預測結果：依日期排序的列，可附帶上下界。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastResult {
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn new(points: Vec<ForecastPoint>) -> Self {
        Self { points }
    }

    pub fn from_values(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::model(format!(
                "{} forecast dates for {} values",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self {
            points: dates
                .into_iter()
                .zip(values)
                .map(|(date, value)| ForecastPoint {
                    date,
                    value,
                    lower: None,
                    upper: None,
                })
                .collect(),
        })
    }

    pub fn with_bounds(mut self, lower: &[f64], upper: &[f64]) -> Result<Self> {
        if lower.len() != self.points.len() || upper.len() != self.points.len() {
            return Err(ForecastError::model(format!(
                "bounds length mismatch: {} rows, {} lower, {} upper",
                self.points.len(),
                lower.len(),
                upper.len()
            )));
        }
        for (point, (&lo, &hi)) in self.points.iter_mut().zip(lower.iter().zip(upper)) {
            point.lower = Some(lo);
            point.upper = Some(hi);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn has_bounds(&self) -> bool {
        !self.points.is_empty()
            && self
                .points
                .iter()
                .all(|p| p.lower.is_some() && p.upper.is_some())
    }

    /// 只保留日期 >= `cutoff` 的列，供顯示用。
    pub fn restrict_from(&self, cutoff: NaiveDate) -> ForecastResult {
        ForecastResult {
            points: self
                .points
                .iter()
                .copied()
                .filter(|p| p.date >= cutoff)
                .collect(),
        }
    }
}

/// 信賴區間 (與預測同一組日期)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub dates: Vec<NaiveDate>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ConfidenceInterval {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Recurrent,
    Seasonal,
    Decomposition,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Recurrent => "recurrent",
            ModelKind::Seasonal => "seasonal",
            ModelKind::Decomposition => "decomposition",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelForecast {
    pub model: ModelKind,
    pub result: ForecastResult,
}

/// 比較畫面所需的全部資料：原始序列、處理後序列、各模型預測。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub original: TimeSeries,
    pub treated: TimeSeries,
    pub compare_from: NaiveDate,
    pub bounds: OutlierBounds,
    pub forecasts: Vec<ModelForecast>,
}

impl ComparisonReport {
    pub fn forecast(&self, model: ModelKind) -> Option<&ForecastResult> {
        self.forecasts
            .iter()
            .find(|f| f.model == model)
            .map(|f| &f.result)
    }

    /// 處理後數值有變動的月份數。
    pub fn replaced_months(&self) -> usize {
        self.original
            .iter()
            .zip(self.treated.iter())
            .filter(|(a, b)| a.value != b.value)
            .count()
    }
}
