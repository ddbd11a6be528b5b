//! 趨勢 + 季節分解模型，估計交給 `augurs` 的 Prophet。
//!
//! 分段線性趨勢加傅立葉季節項，乘法模式下 `y = g(t)·(1 + s(t))`，
//! 加法模式下 `y = g(t) + s(t)`。另外固定加上一個「十二月」季節項。

use crate::config::settings::DecompositionSettings;
use crate::domain::calendar::Frequency;
use crate::domain::model::{ForecastPoint, ForecastResult, Observation, TimeSeries};
use crate::utils::error::{ForecastError, Result};
use augurs::prophet::wasmstan::WasmstanOptimizer;
use augurs::prophet::{
    FeatureMode, PositiveFloat, PredictionData, Predictions, Prophet, ProphetOptions,
    Seasonality as ProphetSeasonality, SeasonalityOption, TrainingData,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    Additive,
    #[default]
    Multiplicative,
}

impl FromStr for SeasonalityMode {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "additive" => Ok(SeasonalityMode::Additive),
            "multiplicative" => Ok(SeasonalityMode::Multiplicative),
            other => Err(ForecastError::InvalidConfigValueError {
                field: "seasonality_mode".to_string(),
                value: other.to_string(),
                reason: "Supported modes: additive, multiplicative".to_string(),
            }),
        }
    }
}

impl fmt::Display for SeasonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonalityMode::Additive => f.write_str("additive"),
            SeasonalityMode::Multiplicative => f.write_str("multiplicative"),
        }
    }
}

impl From<SeasonalityMode> for FeatureMode {
    fn from(mode: SeasonalityMode) -> Self {
        match mode {
            SeasonalityMode::Additive => FeatureMode::Additive,
            SeasonalityMode::Multiplicative => FeatureMode::Multiplicative,
        }
    }
}

fn positive(field: &str, value: f64) -> Result<PositiveFloat> {
    PositiveFloat::try_from(value).map_err(|e| ForecastError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// 一個傅立葉季節項；週期以天計。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: u32,
    pub prior_scale: f64,
}

impl Seasonality {
    pub fn new(name: impl Into<String>, period_days: f64, fourier_order: u32, prior_scale: f64) -> Self {
        Self {
            name: name.into(),
            period_days,
            fourier_order,
            prior_scale,
        }
    }

    /// 十二月自訂季節項 (週期 365.25 天，3 階)。
    pub fn december(prior_scale: f64) -> Self {
        Self::new("december", 365.25, 3, prior_scale)
    }

    fn to_prophet(&self) -> Result<ProphetSeasonality> {
        let order = NonZeroU32::new(self.fourier_order).ok_or_else(|| {
            ForecastError::InvalidConfigValueError {
                field: format!("seasonality.{}.fourier_order", self.name),
                value: self.fourier_order.to_string(),
                reason: "must be at least 1".to_string(),
            }
        })?;
        Ok(
            ProphetSeasonality::new(positive("seasonality.period", self.period_days)?, order)
                .with_prior_scale(positive("seasonality.prior_scale", self.prior_scale)?),
        )
    }
}

fn auto_or(choice: Option<bool>) -> SeasonalityOption {
    match choice {
        Some(enabled) => SeasonalityOption::Manual(enabled),
        None => SeasonalityOption::Auto,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecompositionConfig {
    pub n_changepoints: u32,
    pub changepoint_prior_scale: f64,
    pub seasonality_mode: SeasonalityMode,
    pub seasonality_prior_scale: f64,
    /// `None` 表示依歷史長度自動決定。
    pub yearly_seasonality: Option<bool>,
    pub weekly_seasonality: Option<bool>,
    pub extra_seasonalities: Vec<Seasonality>,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_prior_scale: 1.25,
            seasonality_mode: SeasonalityMode::Multiplicative,
            seasonality_prior_scale: 10.0,
            yearly_seasonality: None,
            weekly_seasonality: None,
            extra_seasonalities: vec![Seasonality::december(10.0)],
        }
    }
}

impl From<&DecompositionSettings> for DecompositionConfig {
    fn from(settings: &DecompositionSettings) -> Self {
        Self {
            n_changepoints: u32::try_from(settings.n_changepoints).unwrap_or(u32::MAX),
            changepoint_prior_scale: settings.changepoint_prior_scale,
            seasonality_mode: settings.seasonality_mode,
            ..Self::default()
        }
    }
}

impl DecompositionConfig {
    /// Prophet 的選項；日內季節項一律關閉。
    pub fn options(&self) -> Result<ProphetOptions> {
        Ok(ProphetOptions {
            n_changepoints: self.n_changepoints,
            changepoint_prior_scale: positive("changepoint_prior_scale", self.changepoint_prior_scale)?,
            seasonality_mode: self.seasonality_mode.into(),
            seasonality_prior_scale: positive("seasonality_prior_scale", self.seasonality_prior_scale)?,
            yearly_seasonality: auto_or(self.yearly_seasonality),
            weekly_seasonality: auto_or(self.weekly_seasonality),
            daily_seasonality: SeasonalityOption::Manual(false),
            ..ProphetOptions::default()
        })
    }
}

fn timestamp(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// 已訓練的 Prophet 模型與其訓練歷史。
pub struct FittedDecomposition {
    prophet: Prophet<WasmstanOptimizer>,
    mode: SeasonalityMode,
    history: Vec<Observation>,
    seasonality_names: Vec<String>,
}

impl fmt::Debug for FittedDecomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedDecomposition")
            .field("mode", &self.mode)
            .field("history", &self.history.len())
            .field("seasonalities", &self.seasonality_names)
            .finish()
    }
}

impl FittedDecomposition {
    pub fn fit(observations: &[Observation], config: &DecompositionConfig) -> Result<Self> {
        if observations.len() < 2 {
            return Err(ForecastError::InsufficientHistory {
                needed: 2,
                got: observations.len(),
            });
        }
        if observations.windows(2).any(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::data("training dates must be strictly increasing"));
        }
        if observations.iter().any(|o| !o.value.is_finite()) {
            return Err(ForecastError::data("training values must be finite"));
        }

        let mut prophet = Prophet::new(config.options()?, WasmstanOptimizer::new());
        for seasonality in &config.extra_seasonalities {
            prophet.add_seasonality(seasonality.name.clone(), seasonality.to_prophet()?)?;
        }

        let data = TrainingData::new(
            observations.iter().map(|o| timestamp(o.date)).collect(),
            observations.iter().map(|o| o.value).collect(),
        )?;
        prophet.fit(data, Default::default())?;

        let mut model = Self {
            prophet,
            mode: config.seasonality_mode,
            history: observations.to_vec(),
            seasonality_names: Vec::new(),
        };
        let dates: Vec<NaiveDate> = observations.iter().map(|o| o.date).collect();
        let mut names: Vec<String> = model.predictions(&dates)?.seasonalities.into_keys().collect();
        names.sort();
        model.seasonality_names = names;

        tracing::info!(
            "Decomposition fit: {} points, seasonalities {:?}, mode {}",
            model.history.len(),
            model.seasonality_names,
            model.mode
        );
        Ok(model)
    }

    fn predictions(&self, dates: &[NaiveDate]) -> Result<Predictions> {
        let data = PredictionData::new(dates.iter().map(|&d| timestamp(d)).collect());
        Ok(self.prophet.predict(data)?)
    }

    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    pub fn seasonality_names(&self) -> Vec<&str> {
        self.seasonality_names.iter().map(String::as_str).collect()
    }

    pub fn history_end(&self) -> Option<NaiveDate> {
        self.history.last().map(|o| o.date)
    }

    /// 原始單位的趨勢值。
    pub fn trend(&self, dates: &[NaiveDate]) -> Result<Vec<f64>> {
        Ok(self.predictions(dates)?.trend.point)
    }

    /// 單一季節項在各日期的值。乘法模式為相對比例，加法模式為原始單位。
    pub fn seasonal_component(&self, name: &str, dates: &[NaiveDate]) -> Result<Option<Vec<f64>>> {
        Ok(self
            .predictions(dates)?
            .seasonalities
            .remove(name)
            .map(|component| component.point))
    }

    /// 點估計與不確定性區間。
    pub fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<ForecastPoint>> {
        let yhat = self.predictions(dates)?.yhat;
        let bound = |side: &Option<Vec<f64>>, i: usize| side.as_ref().and_then(|v| v.get(i).copied());
        Ok(dates
            .iter()
            .zip(&yhat.point)
            .enumerate()
            .map(|(i, (&date, &value))| ForecastPoint {
                date,
                value,
                lower: bound(&yhat.lower, i),
                upper: bound(&yhat.upper, i),
            })
            .collect())
    }
}

/// 分解模型的預測介面：先 `train`，再 `forecast`。
#[derive(Debug, Default)]
pub struct DecompositionAdapter {
    config: DecompositionConfig,
    fitted: Option<FittedDecomposition>,
}

impl DecompositionAdapter {
    pub fn new(config: DecompositionConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn train(&mut self, series: &TimeSeries) -> Result<()> {
        self.train_observations(series.observations())
    }

    /// 不限月資料；日期需嚴格遞增。
    pub fn train_observations(&mut self, observations: &[Observation]) -> Result<()> {
        self.fitted = Some(FittedDecomposition::fit(observations, &self.config)?);
        Ok(())
    }

    pub fn fitted(&self) -> Option<&FittedDecomposition> {
        self.fitted.as_ref()
    }

    /// 歷史 + 往後 `n` 期 (頻率 `freq`) 的完整預測，每列都有上下界。
    pub fn forecast(&self, n: usize, freq: Frequency) -> Result<ForecastResult> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::state("forecast() called before train()"))?;
        let last = fitted
            .history_end()
            .ok_or_else(|| ForecastError::state("model has no history"))?;

        let mut dates: Vec<NaiveDate> = fitted.history.iter().map(|o| o.date).collect();
        if n > 0 {
            dates.extend(freq.range(freq.step(last)?, n)?);
        }
        Ok(ForecastResult::new(fitted.predict(&dates)?))
    }

    /// 只保留 `cutoff` 當天及之後的列 (顯示用)。
    pub fn restrict_from(forecast: &ForecastResult, cutoff: NaiveDate) -> ForecastResult {
        forecast.restrict_from(cutoff)
    }
}
