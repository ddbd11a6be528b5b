//! 統計小工具：分位數、中位數、區間 z 值。

use statrs::distribution::{ContinuousCDF, Normal};

/// 線性內插分位數 (Hyndman-Fan 第 7 型)。
///
/// `values` 不需事先排序；空陣列回傳 NaN。
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    quantile_sorted(&sorted, p)
}

/// 已排序資料的線性內插分位數。
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let p = p.clamp(0.0, 1.0);
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// 區間寬度 (例如 0.95) 對應的雙尾 z 值。
pub fn interval_z(width: f64) -> f64 {
    Normal::standard().inverse_cdf((1.0 + width) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&values, 0.25), 1.75);
        assert_relative_eq!(quantile(&values, 0.75), 3.25);
        assert_relative_eq!(quantile(&values, 0.5), 2.5);
    }

    #[test]
    fn test_quantile_unsorted_input() {
        let values = [100.0, 10.0, 10.0, 10.0, 10.0];
        assert_relative_eq!(quantile(&values, 0.25), 10.0);
        assert_relative_eq!(quantile(&values, 0.75), 10.0);
        assert_relative_eq!(median(&values), 10.0);
    }

    #[test]
    fn test_quantile_single_value() {
        assert_relative_eq!(quantile(&[42.0], 0.25), 42.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_interval_z() {
        assert_relative_eq!(interval_z(0.95), 1.959964, epsilon = 1e-6);
        assert_relative_eq!(interval_z(0.8), 1.281552, epsilon = 1e-6);
        assert!(interval_z(0.0).abs() < 1e-12);
    }
}
