use crate::domain::model::{MonthBounds, OutlierBounds, TimeSeries};
use crate::utils::stats::{median, quantile};
use chrono::Datelike;
use std::collections::BTreeMap;

/// IQR 乘數。刻意調過，不是慣用的 1.5。
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.125;

/// 以「同一個月份跨年度」的分布找出離群值，並換成該月份的中位數。
#[derive(Debug, Clone)]
pub struct OutlierTreater {
    multiplier: f64,
}

impl Default for OutlierTreater {
    fn default() -> Self {
        Self::new(DEFAULT_IQR_MULTIPLIER)
    }
}

impl OutlierTreater {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// 每個有觀測值的月份 (1-12) 各自的 Q1/Q3/界線/中位數。
    pub fn bounds(&self, series: &TimeSeries) -> OutlierBounds {
        let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for obs in series.iter() {
            groups.entry(obs.date.month()).or_default().push(obs.value);
        }

        let months = groups
            .into_iter()
            .map(|(month, values)| {
                let q1 = quantile(&values, 0.25);
                let q3 = quantile(&values, 0.75);
                let iqr = q3 - q1;
                let bounds = MonthBounds {
                    month,
                    count: values.len(),
                    q1,
                    q3,
                    lower: q1 - self.multiplier * iqr,
                    upper: q3 + self.multiplier * iqr,
                    median: median(&values),
                };
                (month, bounds)
            })
            .collect();

        OutlierBounds::new(months)
    }

    pub fn treat(&self, series: &TimeSeries) -> TimeSeries {
        self.treat_with_bounds(series).0
    }

    /// 中位數取自替換前的資料；日期索引與順序不變。
    pub fn treat_with_bounds(&self, series: &TimeSeries) -> (TimeSeries, OutlierBounds) {
        let bounds = self.bounds(series);

        let treated = series.map_values(|obs| match bounds.for_date(obs.date) {
            Some(month) if month.is_outlier(obs.value) => month.median,
            _ => obs.value,
        });

        for month in bounds.iter() {
            let replaced = series
                .iter()
                .filter(|o| o.date.month() == month.month && month.is_outlier(o.value))
                .count();
            if replaced > 0 {
                tracing::debug!(
                    "Month {:02}: replaced {} of {} values outside [{:.3}, {:.3}] with median {:.3}",
                    month.month,
                    replaced,
                    month.count,
                    month.lower,
                    month.upper,
                    month.median
                );
            }
        }

        (treated, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// 每年一月取 `januaries` 的值，其餘月份固定 10.0。
    fn with_januaries(januaries: &[f64]) -> TimeSeries {
        let values: Vec<f64> = januaries
            .iter()
            .flat_map(|&jan| std::iter::once(jan).chain(std::iter::repeat(10.0).take(11)))
            .collect();
        monthly(2019, &values)
    }

    fn monthly(start_year: i32, values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_bounds_use_tuned_multiplier() {
        // 四年的一月：1, 2, 3, 4 -> Q1 = 1.75, Q3 = 3.25, IQR = 1.5
        let mut values = Vec::new();
        for year in 0..4 {
            for month in 0..12 {
                values.push(if month == 0 { (year + 1) as f64 } else { 10.0 });
            }
        }
        let series = monthly(2020, &values);
        let bounds = OutlierTreater::default().bounds(&series);
        let january = bounds.for_month(1).unwrap();

        assert_eq!(january.count, 4);
        assert!((january.q1 - 1.75).abs() < 1e-12);
        assert!((january.q3 - 3.25).abs() < 1e-12);
        assert!((january.lower - (1.75 - 1.125 * 1.5)).abs() < 1e-12);
        assert!((january.upper - (3.25 + 1.125 * 1.5)).abs() < 1e-12);
        assert_eq!(bounds.len(), 12);
    }

    #[test]
    fn test_treat_replaces_spike_with_month_median() {
        // 四年的二月：100, 900, 100, 100 -> Q1 = 100, Q3 = 300, 上界 525
        let mut values = vec![100.0; 48];
        values[13] = 900.0; // 第二年二月
        let series = monthly(2020, &values);

        let (treated, bounds) = OutlierTreater::default().treat_with_bounds(&series);
        let february = bounds.for_month(2).unwrap();
        assert!((february.upper - 525.0).abs() < 1e-12);

        assert_eq!(treated.dates(), series.dates());
        assert_eq!(treated.values()[13], 100.0);
        assert_eq!(
            treated.values().iter().filter(|&&v| v == 100.0).count(),
            48
        );
    }

    #[test]
    fn test_three_year_spike_stays_inside_bounds() {
        // 三年的二月：100, 900, 100 -> Q3 = 500, 上界 950，900 保留
        let mut values = vec![100.0; 36];
        values[13] = 900.0;
        let series = monthly(2020, &values);
        assert_eq!(OutlierTreater::default().treat(&series), series);
    }

    #[test]
    fn test_treat_leaves_clean_series_untouched() {
        let values: Vec<f64> = (0..48).map(|i| 50.0 + (i % 12) as f64).collect();
        let series = monthly(2019, &values);
        assert_eq!(OutlierTreater::default().treat(&series), series);
    }

    #[test]
    fn test_treat_single_observation_month() {
        let series = monthly(2024, &[5.0, 6.0, 7.0]);
        let (treated, bounds) = OutlierTreater::default().treat_with_bounds(&series);
        assert_eq!(treated, series);
        let march = bounds.for_month(3).unwrap();
        assert_eq!(march.lower, 7.0);
        assert_eq!(march.upper, 7.0);
    }

    #[test]
    fn test_multiplier_is_configurable() {
        // 一月：1, 2, 3, 4, x -> Q1 = 2, Q3 = 4, IQR = 2
        // 1.125 倍上界 6.25，1.5 倍上界 7.0
        let series = with_januaries(&[1.0, 2.0, 3.0, 4.0, 6.5]);
        let tuned = OutlierTreater::default().treat(&series);
        let classic = OutlierTreater::new(1.5).treat(&series);

        assert_eq!(tuned.value_at(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()), Some(3.0));
        assert_eq!(classic, series);
    }

    #[test]
    fn test_constant_january_with_spike() {
        let series = with_januaries(&[10.0, 10.0, 10.0, 10.0, 100.0]);
        let treated = OutlierTreater::default().treat(&series);
        assert!(treated.values().iter().all(|&v| v == 10.0));
    }
}
