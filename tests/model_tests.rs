use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};
use monthly_forecast::adapters::forecast::{
    ArimaOrder, DecompositionConfig, SeasonalOrder, SeasonalityMode,
};
use monthly_forecast::domain::calendar::Frequency;
use monthly_forecast::domain::model::{ModelKind, TimeSeries};
use monthly_forecast::domain::services::OutlierTreater;
use monthly_forecast::utils::error::{ErrorCategory, ForecastError};
use monthly_forecast::{DecompositionAdapter, SeasonalAdapter};
use tempfile::TempDir;

fn date(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

/// 趨勢 + 年週期的月序列 (加上小幅固定擾動)，從 2019-01 開始。
fn seasonal_series(months: usize) -> TimeSeries {
    let values: Vec<f64> = (0..months)
        .map(|t| {
            let noise = ((t * 7919) % 11) as f64 / 110.0 - 0.05;
            let t = t as f64;
            60.0 + 0.3 * t + 6.0 * (t * std::f64::consts::PI / 6.0).sin() + noise
        })
        .collect();
    TimeSeries::from_values(date(2019, 1), &values).unwrap()
}

#[test]
fn test_treatment_keeps_dates_and_is_stable() {
    let mut values: Vec<f64> = seasonal_series(72).values();
    values[50] *= 3.0;
    let series = TimeSeries::from_values(date(2019, 1), &values).unwrap();

    let treater = OutlierTreater::new(1.125);
    let (treated, bounds) = treater.treat_with_bounds(&series);

    assert_eq!(treated.dates(), series.dates());
    assert_eq!(bounds.len(), 12);
    let spike_date = date(2023, 3);
    assert_eq!(
        treated.value_at(spike_date),
        bounds.for_date(spike_date).map(|b| b.median)
    );
    let changed = series
        .iter()
        .zip(treated.iter())
        .filter(|(a, b)| a.value != b.value)
        .count();
    assert_eq!(changed, 1);
}

#[test]
fn test_seasonal_cutoff_forecast_dates() {
    let series = seasonal_series(72);
    let adapter = SeasonalAdapter::from_series(
        &series,
        ArimaOrder::default(),
        SeasonalOrder::default(),
        Some(date(2024, 11)),
    )
    .unwrap();

    let forecast = adapter.forecast_with_interval(6, None).unwrap();
    assert_eq!(
        forecast.dates(),
        vec![
            date(2024, 12),
            date(2025, 1),
            date(2025, 2),
            date(2025, 3),
            date(2025, 4),
            date(2025, 5)
        ]
    );
    for point in forecast.iter() {
        let (lower, upper) = (point.lower.unwrap(), point.upper.unwrap());
        assert!(lower <= point.value && point.value <= upper);
    }
}

#[test]
fn test_seasonal_persist_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("models").join("sarima.json");

    let adapter = SeasonalAdapter::from_series(
        &seasonal_series(60),
        ArimaOrder::default(),
        SeasonalOrder::default(),
        None,
    )
    .unwrap();
    adapter.persist(&path).unwrap();

    let restored = SeasonalAdapter::load(&path).unwrap();
    assert_eq!(restored.model().order(), adapter.model().order());
    assert_eq!(restored.model().seasonal_order(), adapter.model().seasonal_order());
    assert_eq!(restored.model().history(), adapter.model().history());
    assert_relative_eq!(restored.model().sigma2(), adapter.model().sigma2());

    let start = Some(date(2024, 1));
    assert_eq!(
        restored.forecast_with_interval(6, start).unwrap(),
        adapter.forecast_with_interval(6, start).unwrap()
    );

    // 還原的模型不記得最後日期
    let err = restored.forecast(6, None).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Config);
}

#[test]
fn test_short_history_is_model_error() {
    let err = SeasonalAdapter::from_series(
        &seasonal_series(20),
        ArimaOrder::default(),
        SeasonalOrder::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientHistory { .. }));
    assert_eq!(err.category(), ErrorCategory::Model);
}

#[test]
fn test_decomposition_additive_history_and_future() {
    let config = DecompositionConfig {
        seasonality_mode: SeasonalityMode::Additive,
        ..DecompositionConfig::default()
    };
    let mut adapter = DecompositionAdapter::new(config);
    let series = seasonal_series(48);
    adapter.train(&series).unwrap();

    let forecast = adapter.forecast(6, Frequency::MonthStart).unwrap();
    assert_eq!(forecast.len(), 54);
    assert_eq!(forecast.dates()[48], date(2023, 1));
    assert!(forecast.has_bounds());

    let fitted: Vec<f64> = forecast.values().into_iter().take(48).collect();
    let mae = fitted
        .iter()
        .zip(series.values())
        .map(|(f, v)| (f - v).abs())
        .sum::<f64>()
        / 48.0;
    assert!(mae < 5.0, "mean absolute error {}", mae);

    let restricted = DecompositionAdapter::restrict_from(&forecast, date(2022, 7));
    assert_eq!(restricted.len(), 12);
    assert!(restricted.dates().iter().all(|d| *d >= date(2022, 7)));
    assert_eq!(restricted.dates()[0].month(), 7);
}

#[test]
fn test_model_kind_names() {
    assert_eq!(ModelKind::Recurrent.to_string(), "recurrent");
    assert_eq!(ModelKind::Seasonal.as_str(), "seasonal");
    assert_relative_eq!(OutlierTreater::new(1.5).multiplier(), 1.5);
}
