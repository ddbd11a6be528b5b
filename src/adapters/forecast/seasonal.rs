//! 季節自我迴歸整合移動平均模型 (SARIMA) 與其預測介面。
//!
//! 估計交給 `anofox_forecast`：有季節項時用 `SARIMA`，否則用 `ARIMA`。
//! 區間為點預測 ± z·σ·√h，σ² 取估計殘差的均方。

use crate::domain::calendar::{next_month_start, Frequency};
use crate::domain::model::{ConfidenceInterval, ForecastResult, TimeSeries};
use crate::utils::error::{ForecastError, Result};
use crate::utils::stats::interval_z;
use anofox_forecast::core::TimeSeries as EstimationSeries;
use anofox_forecast::models::arima::{ARIMA, SARIMA};
use anofox_forecast::models::Forecaster;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.95;

/// 非季節階數 (p, d, q)。設定檔中寫成 `[p, d, q]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize, usize)", into = "(usize, usize, usize)")]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(0, 1, 2)
    }
}

impl From<(usize, usize, usize)> for ArimaOrder {
    fn from((p, d, q): (usize, usize, usize)) -> Self {
        Self::new(p, d, q)
    }
}

impl From<ArimaOrder> for (usize, usize, usize) {
    fn from(order: ArimaOrder) -> Self {
        (order.p, order.d, order.q)
    }
}

/// 季節階數 (P, D, Q, period)。設定檔中寫成 `[P, D, Q, s]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(usize, usize, usize, usize)",
    into = "(usize, usize, usize, usize)"
)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub period: usize,
}

impl SeasonalOrder {
    pub fn new(p: usize, d: usize, q: usize, period: usize) -> Self {
        Self { p, d, q, period }
    }

    pub fn none() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn is_seasonal(&self) -> bool {
        self.p + self.d + self.q > 0
    }
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self::new(1, 1, 1, 12)
    }
}

impl From<(usize, usize, usize, usize)> for SeasonalOrder {
    fn from((p, d, q, period): (usize, usize, usize, usize)) -> Self {
        Self::new(p, d, q, period)
    }
}

impl From<SeasonalOrder> for (usize, usize, usize, usize) {
    fn from(order: SeasonalOrder) -> Self {
        (order.p, order.d, order.q, order.period)
    }
}

fn ar_degree(order: ArimaOrder, seasonal: SeasonalOrder) -> usize {
    let s = if seasonal.is_seasonal() { seasonal.period } else { 0 };
    order.p + order.d + s * (seasonal.p + seasonal.d)
}

/// 估計用的序列只看數值，日期取自 1970-01 起的月初。
fn estimation_series(values: &[f64]) -> Result<EstimationSeries> {
    let anchor = NaiveDate::from_ymd_opt(1970, 1, 1)
        .ok_or_else(|| ForecastError::data("invalid calendar anchor"))?;
    let timestamps = Frequency::MonthStart
        .range(anchor, values.len())?
        .into_iter()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .collect();
    Ok(EstimationSeries::univariate(timestamps, values.to_vec())?)
}

#[derive(Debug, Clone)]
enum Estimator {
    Arima(ARIMA),
    Sarima(SARIMA),
}

impl Estimator {
    fn fit(order: ArimaOrder, seasonal: SeasonalOrder, series: &EstimationSeries) -> Result<Self> {
        if seasonal.is_seasonal() {
            let mut model = SARIMA::new(
                order.p,
                order.d,
                order.q,
                seasonal.p,
                seasonal.d,
                seasonal.q,
                seasonal.period,
            );
            model.fit(series)?;
            Ok(Self::Sarima(model))
        } else {
            let mut model = ARIMA::new(order.p, order.d, order.q);
            model.fit(series)?;
            Ok(Self::Arima(model))
        }
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        let forecast = match self {
            Self::Arima(model) => model.predict(steps)?,
            Self::Sarima(model) => model.predict(steps)?,
        };
        Ok(forecast.primary().to_vec())
    }

    fn residuals(&self) -> &[f64] {
        let residuals = match self {
            Self::Arima(model) => model.residuals(),
            Self::Sarima(model) => model.residuals(),
        };
        residuals.unwrap_or(&[])
    }
}

/// 殘差均方；略過估計起始段補上的 0 與非有限值。
fn residual_variance(residuals: &[f64]) -> f64 {
    let used: Vec<f64> = residuals
        .iter()
        .copied()
        .skip_while(|r| *r == 0.0)
        .filter(|r| r.is_finite())
        .collect();
    if used.is_empty() {
        return 0.0;
    }
    used.iter().map(|r| r * r).sum::<f64>() / used.len() as f64
}

/// 保存格式：階數與估計用的歷史，還原時以相同歷史重新估計。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SarimaState {
    order: ArimaOrder,
    seasonal_order: SeasonalOrder,
    history: Vec<f64>,
}

/// 已估計的模型。
#[derive(Debug, Clone)]
pub struct FittedSarima {
    state: SarimaState,
    estimator: Estimator,
    sigma2: f64,
}

impl FittedSarima {
    /// 需要的最少觀測數：展開後 AR 階數 + 係數個數 + 1。
    pub fn required_history(order: ArimaOrder, seasonal: SeasonalOrder) -> usize {
        ar_degree(order, seasonal) + order.p + order.q + seasonal.p + seasonal.q + 1
    }

    pub fn fit(values: &[f64], order: ArimaOrder, seasonal: SeasonalOrder) -> Result<Self> {
        Self::from_state(SarimaState {
            order,
            seasonal_order: seasonal,
            history: values.to_vec(),
        })
    }

    fn from_state(state: SarimaState) -> Result<Self> {
        let (order, seasonal) = (state.order, state.seasonal_order);
        if seasonal.is_seasonal() && seasonal.period < 2 {
            return Err(ForecastError::config(format!(
                "seasonal period must be at least 2, got {}",
                seasonal.period
            )));
        }
        let needed = Self::required_history(order, seasonal);
        if state.history.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                got: state.history.len(),
            });
        }
        if state.history.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::data("series contains non-finite values"));
        }

        let estimator = Estimator::fit(order, seasonal, &estimation_series(&state.history)?)?;
        let sigma2 = residual_variance(estimator.residuals());

        tracing::debug!(
            "SARIMA{:?}x{:?} fit on {} points: sigma2={:.6}",
            <(usize, usize, usize)>::from(order),
            <(usize, usize, usize, usize)>::from(seasonal),
            state.history.len(),
            sigma2
        );

        Ok(Self {
            state,
            estimator,
            sigma2,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.state.order
    }

    pub fn seasonal_order(&self) -> SeasonalOrder {
        self.state.seasonal_order
    }

    pub fn history(&self) -> &[f64] {
        &self.state.history
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// 從歷史最後一期之後往前推 `steps` 期。
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>> {
        if steps == 0 {
            return Ok(Vec::new());
        }
        let values = self.estimator.predict(steps)?;
        if values.len() != steps || values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model(format!(
                "seasonal model produced {} usable values for {} steps",
                values.iter().filter(|v| v.is_finite()).count(),
                steps
            )));
        }
        Ok(values)
    }

    /// 第 h 步的預測誤差變異數 σ²·h。
    pub fn forecast_variance(&self, steps: usize) -> Vec<f64> {
        (1..=steps).map(|h| self.sigma2 * h as f64).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.state)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: SarimaState = serde_json::from_slice(bytes)?;
        Self::from_state(state)
    }
}

/// 統計季節模型的預測介面。每個實例擁有一個模型。
#[derive(Debug, Clone)]
pub struct SeasonalAdapter {
    model: FittedSarima,
    last_date: Option<NaiveDate>,
    interval_width: f64,
}

impl SeasonalAdapter {
    /// 以 (截止日前的) 序列重新估計模型，並記住最後一期日期。
    pub fn from_series(
        series: &TimeSeries,
        order: ArimaOrder,
        seasonal_order: SeasonalOrder,
        cutoff: Option<NaiveDate>,
    ) -> Result<Self> {
        let series = match cutoff {
            Some(cutoff) => series.until(cutoff),
            None => series.clone(),
        };
        let model = FittedSarima::fit(&series.values(), order, seasonal_order)?;
        tracing::info!(
            "Fitted seasonal model on {} months (last {})",
            series.len(),
            series.last_date().map(|d| d.to_string()).unwrap_or_default()
        );
        Ok(Self {
            model,
            last_date: series.last_date(),
            interval_width: DEFAULT_INTERVAL_WIDTH,
        })
    }

    /// 還原已保存的模型；沒有最後日期，預測時必須給起始日。
    pub fn from_persisted(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            model: FittedSarima::from_bytes(bytes)?,
            last_date: None,
            interval_width: DEFAULT_INTERVAL_WIDTH,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_persisted(&bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.model.to_bytes()
    }

    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        tracing::info!("💾 Seasonal model saved to {}", path.display());
        Ok(())
    }

    pub fn model(&self) -> &FittedSarima {
        &self.model
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    fn resolve_dates(&self, n: usize, start: Option<NaiveDate>) -> Result<Vec<NaiveDate>> {
        if n == 0 {
            return Err(ForecastError::config("forecast horizon must be at least 1"));
        }
        let start = match (start, self.last_date) {
            (Some(start), _) => start,
            (None, Some(last)) => next_month_start(last)?,
            (None, None) => {
                return Err(ForecastError::config(
                    "no start date given and the model has no remembered last date",
                ))
            }
        };
        Frequency::MonthStart.range(start, n)
    }

    pub fn forecast(&self, n: usize, start: Option<NaiveDate>) -> Result<ForecastResult> {
        let dates = self.resolve_dates(n, start)?;
        ForecastResult::from_values(dates, self.model.forecast(n)?)
    }

    pub fn confidence_interval(&self, n: usize, start: Option<NaiveDate>) -> Result<ConfidenceInterval> {
        let dates = self.resolve_dates(n, start)?;
        let z = interval_z(self.interval_width);
        let (lower, upper) = self
            .model
            .forecast(n)?
            .into_iter()
            .zip(self.model.forecast_variance(n))
            .map(|(mean, var)| {
                let half = z * var.sqrt();
                (mean - half, mean + half)
            })
            .unzip();
        Ok(ConfidenceInterval { dates, lower, upper })
    }

    /// 點預測加上信賴區間。
    pub fn forecast_with_interval(&self, n: usize, start: Option<NaiveDate>) -> Result<ForecastResult> {
        let interval = self.confidence_interval(n, start)?;
        self.forecast(n, start)?
            .with_bounds(&interval.lower, &interval.upper)
    }
}
