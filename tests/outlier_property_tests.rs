//! 月別 IQR 處理的性質測試：隨機長度的月序列加上注入的尖峰。

use chrono::NaiveDate;
use monthly_forecast::domain::model::TimeSeries;
use monthly_forecast::domain::services::OutlierTreater;
use proptest::prelude::*;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()
}

/// 12 到 96 個月的數值，最多四個位置乘上 3 到 20 倍。
fn spiked_values() -> impl Strategy<Value = Vec<f64>> {
    (12usize..=96).prop_flat_map(|len| {
        (
            prop::collection::vec(1_000.0..1_000_000.0_f64, len),
            prop::collection::vec((0..len, 3.0..20.0_f64), 0..=4),
        )
            .prop_map(|(mut values, spikes)| {
                for (index, factor) in spikes {
                    values[index] *= factor;
                }
                values
            })
    })
}

/// 每個月份固定一個基準值，至少四年，單一尖峰。
fn flat_months_with_spike() -> impl Strategy<Value = (Vec<f64>, usize, f64)> {
    (48usize..=96).prop_flat_map(|len| {
        (
            prop::collection::vec(1_000.0..1_000_000.0_f64, 12),
            0..len,
            3.0..20.0_f64,
        )
            .prop_map(move |(bases, spike, factor)| {
                let mut values: Vec<f64> = (0..len).map(|i| bases[i % 12]).collect();
                values[spike] *= factor;
                (values, spike, bases[spike % 12])
            })
    })
}

proptest! {
    #[test]
    fn treated_values_are_kept_or_take_month_median(
        values in spiked_values(),
        multiplier in 0.5..3.0_f64,
    ) {
        let series = TimeSeries::from_values(start(), &values).unwrap();
        let (treated, bounds) = OutlierTreater::new(multiplier).treat_with_bounds(&series);

        prop_assert_eq!(treated.dates(), series.dates());

        for (original, cleaned) in series.iter().zip(treated.iter()) {
            let month = bounds.for_date(original.date).unwrap();
            if month.is_outlier(original.value) {
                prop_assert_eq!(cleaned.value, month.median);
            } else {
                prop_assert_eq!(cleaned.value, original.value);
            }
            let slack = 1e-9 * month.upper.abs().max(1.0);
            prop_assert!(cleaned.value >= month.lower - slack);
            prop_assert!(cleaned.value <= month.upper + slack);
        }
    }

    #[test]
    fn single_spike_in_flat_month_is_replaced(
        (values, spike, base) in flat_months_with_spike(),
    ) {
        let series = TimeSeries::from_values(start(), &values).unwrap();
        let treated = OutlierTreater::default().treat(&series);

        let cleaned = treated.values();
        prop_assert_eq!(cleaned[spike], base);
        for (i, value) in cleaned.iter().enumerate() {
            if i != spike {
                prop_assert_eq!(*value, values[i]);
            }
        }
    }
}
