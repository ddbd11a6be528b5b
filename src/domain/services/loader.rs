use crate::domain::calendar::{month_start, next_month_start};
use crate::domain::model::{DailyRecord, Observation, TimeSeries};
use crate::domain::ports::RecordSource;
use crate::utils::error::{ForecastError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// 日總量換算成百萬。
pub const MILLIONS: f64 = 1_000_000.0;

/// 把日資料彙總成月序列。
#[derive(Debug, Clone)]
pub struct SeriesLoader {
    unit_divisor: f64,
}

impl Default for SeriesLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesLoader {
    pub fn new() -> Self {
        Self {
            unit_divisor: MILLIONS,
        }
    }

    pub fn with_unit_divisor(unit_divisor: f64) -> Self {
        Self { unit_divisor }
    }

    /// 讀取、換算單位、按月加總，最後套用 `start` / `end` (都作用在月序列上)。
    pub fn load<S>(
        &self,
        source: &S,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TimeSeries>
    where
        S: RecordSource + ?Sized,
    {
        let records = source.read_records()?;
        tracing::debug!("Read {} daily records from source", records.len());

        let mut series = self.aggregate(records)?;
        if let Some(start) = start {
            series = series.since(start);
        }
        if let Some(end) = end {
            series = series.until(end);
        }

        if series.is_empty() {
            return Err(ForecastError::data(format!(
                "no monthly rows left after filtering (start: {:?}, end: {:?})",
                start, end
            )));
        }

        tracing::info!(
            "Loaded {} months ({} to {})",
            series.len(),
            series.first_date().map(|d| d.to_string()).unwrap_or_default(),
            series.last_date().map(|d| d.to_string()).unwrap_or_default()
        );
        Ok(series)
    }

    /// 依日期排序後按月加總；範圍內沒有紀錄的月份補 0。
    pub fn aggregate(&self, mut records: Vec<DailyRecord>) -> Result<TimeSeries> {
        if records.is_empty() {
            return Err(ForecastError::data("source contains no rows"));
        }
        records.sort_by_key(|r| r.date);

        let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in &records {
            if !record.total.is_finite() {
                return Err(ForecastError::data(format!(
                    "non-finite total on {}",
                    record.date
                )));
            }
            *sums.entry(month_start(record.date)).or_insert(0.0) += record.total / self.unit_divisor;
        }

        let (first, last) = match (sums.keys().next(), sums.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Err(ForecastError::data("source contains no rows")),
        };

        let mut observations = Vec::with_capacity(sums.len());
        let mut current = first;
        while current <= last {
            observations.push(Observation {
                date: current,
                value: sums.get(&current).copied().unwrap_or(0.0),
            });
            current = next_month_start(current)?;
        }

        tracing::debug!(
            "Aggregated {} records into {} months",
            records.len(),
            observations.len()
        );
        TimeSeries::new(observations)
    }
}
