use crate::domain::model::{OutlierBounds, TimeSeries};
use crate::domain::ports::RecordSource;
use crate::domain::services::loader::SeriesLoader;
use crate::domain::services::outliers::OutlierTreater;
use crate::utils::error::{ForecastError, Result};
use chrono::NaiveDate;

/// 保存最近一次載入的序列；`treat` 必須在 `load` 之後呼叫。
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    loader: SeriesLoader,
    treater: OutlierTreater,
    series: Option<TimeSeries>,
    bounds: Option<OutlierBounds>,
}

impl Preprocessor {
    pub fn new(loader: SeriesLoader, treater: OutlierTreater) -> Self {
        Self {
            loader,
            treater,
            series: None,
            bounds: None,
        }
    }

    pub fn load<S>(
        &mut self,
        source: &S,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<TimeSeries>
    where
        S: RecordSource + ?Sized,
    {
        let series = self.loader.load(source, start, end)?;
        self.series = Some(series.clone());
        self.bounds = None;
        Ok(series)
    }

    /// 以現有序列計算界線並替換離群值，處理結果取代原本保存的序列。
    pub fn treat(&mut self) -> Result<TimeSeries> {
        let series = self.loaded()?.clone();
        self.apply(&series)
    }

    /// 處理呼叫端傳入的序列 (例如 `load` 之後再調整過的)，結果同樣取代保存的序列。
    pub fn treat_series(&mut self, series: &TimeSeries) -> Result<TimeSeries> {
        self.loaded()?;
        self.apply(series)
    }

    fn loaded(&self) -> Result<&TimeSeries> {
        self.series
            .as_ref()
            .ok_or_else(|| ForecastError::state("treat() called before any series was loaded"))
    }

    fn apply(&mut self, series: &TimeSeries) -> Result<TimeSeries> {
        let (treated, bounds) = self.treater.treat_with_bounds(series);
        let replaced = series
            .iter()
            .zip(treated.iter())
            .filter(|(a, b)| a.value != b.value)
            .count();
        tracing::info!(
            "Outlier treatment replaced {} of {} months (multiplier {})",
            replaced,
            series.len(),
            self.treater.multiplier()
        );

        self.series = Some(treated.clone());
        self.bounds = Some(bounds);
        Ok(treated)
    }

    pub fn series(&self) -> Option<&TimeSeries> {
        self.series.as_ref()
    }

    /// 最近一次 `treat` 用到的界線。
    pub fn bounds(&self) -> Option<&OutlierBounds> {
        self.bounds.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DailyRecord;

    struct VecSource(Vec<DailyRecord>);

    impl RecordSource for VecSource {
        fn read_records(&self) -> Result<Vec<DailyRecord>> {
            Ok(self.0.clone())
        }
    }

    fn source_with_spike() -> VecSource {
        let mut records = Vec::new();
        for year in 2019..2024 {
            for month in 1..=12 {
                let total = if year == 2023 && month == 1 { 100.0 } else { 10.0 };
                records.push(DailyRecord {
                    date: NaiveDate::from_ymd_opt(year, month, 10).unwrap(),
                    total: total * 1_000_000.0,
                });
            }
        }
        VecSource(records)
    }

    #[test]
    fn test_treat_before_load_is_state_error() {
        let mut preprocessor = Preprocessor::default();
        let err = preprocessor.treat().unwrap_err();
        assert!(matches!(err, ForecastError::StateError { .. }));
        assert!(preprocessor.series().is_none());
    }

    #[test]
    fn test_treat_replaces_held_series() {
        let mut preprocessor = Preprocessor::default();
        let loaded = preprocessor.load(&source_with_spike(), None, None).unwrap();
        assert_eq!(loaded.len(), 60);
        assert!(preprocessor.bounds().is_none());

        let treated = preprocessor.treat().unwrap();
        assert!(treated.values().iter().all(|&v| v == 10.0));
        assert_eq!(preprocessor.series(), Some(&treated));
        assert_eq!(preprocessor.bounds().map(|b| b.len()), Some(12));
    }

    #[test]
    fn test_treat_series_uses_given_series() {
        let mut preprocessor = Preprocessor::default();
        let err = preprocessor.treat_series(&TimeSeries::default()).unwrap_err();
        assert!(matches!(err, ForecastError::StateError { .. }));

        let loaded = preprocessor.load(&source_with_spike(), None, None).unwrap();
        // 只留 2022 年以前：剩下的資料沒有離群值
        let shorter = loaded.until(NaiveDate::from_ymd_opt(2022, 12, 1).unwrap());
        let treated = preprocessor.treat_series(&shorter).unwrap();
        assert_eq!(treated, shorter);
        assert_eq!(treated.len(), 48);
        assert_eq!(preprocessor.series(), Some(&shorter));
    }

    #[test]
    fn test_second_treat_is_stable() {
        let mut preprocessor = Preprocessor::default();
        preprocessor.load(&source_with_spike(), None, None).unwrap();
        let once = preprocessor.treat().unwrap();
        let twice = preprocessor.treat().unwrap();
        assert_eq!(once, twice);
    }
}
