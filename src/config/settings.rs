use crate::adapters::forecast::decomposition::SeasonalityMode;
use crate::adapters::forecast::seasonal::{ArimaOrder, SeasonalOrder};
use crate::domain::calendar::Frequency;
use crate::domain::services::outliers::DEFAULT_IQR_MULTIPLIER;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_date_order, validate_file_extensions, validate_non_empty_string, validate_one_of,
    validate_path, validate_positive_float, validate_positive_number, validate_required_field,
    Validate,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const OUTPUT_FORMATS: [&str; 2] = ["csv", "json"];

fn default_true() -> bool {
    true
}

fn default_date_column() -> String {
    "fecha".to_string()
}

fn default_value_column() -> String {
    "total_diario".to_string()
}

fn default_iqr_multiplier() -> f64 {
    DEFAULT_IQR_MULTIPLIER
}

fn default_input_length() -> usize {
    12
}

fn default_horizon() -> usize {
    6
}

fn default_changepoints() -> usize {
    25
}

fn default_changepoint_prior_scale() -> f64 {
    1.25
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_formats() -> Vec<String> {
    vec!["csv".to_string()]
}

fn default_archive_name() -> String {
    "forecast_output.zip".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub path: String,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl SourceSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            date_column: default_date_column(),
            value_column: default_value_column(),
            start: None,
            end: None,
        }
    }
}

impl Validate for SourceSettings {
    fn validate(&self) -> Result<()> {
        validate_path("source.path", &self.path)?;
        validate_file_extensions("source.path", std::slice::from_ref(&self.path), &["csv", "parquet"])?;
        validate_non_empty_string("source.date_column", &self.date_column)?;
        validate_non_empty_string("source.value_column", &self.value_column)?;
        validate_date_order("source.start/end", self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSettings {
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
}

impl Default for TreatmentSettings {
    fn default() -> Self {
        Self {
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

impl Validate for TreatmentSettings {
    fn validate(&self) -> Result<()> {
        validate_positive_float("treatment.iqr_multiplier", self.iqr_multiplier)
    }
}

/// 預測截止日與比較畫面的起始月份。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSettings {
    #[serde(default)]
    pub cutoff: Option<NaiveDate>,
    #[serde(default)]
    pub compare_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrentSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub scaler_path: Option<String>,
    #[serde(default = "default_input_length")]
    pub input_length: usize,
    #[serde(default = "default_horizon")]
    pub output_length: usize,
}

impl Default for RecurrentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: None,
            scaler_path: None,
            input_length: default_input_length(),
            output_length: default_horizon(),
        }
    }
}

impl Validate for RecurrentSettings {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let model_path = validate_required_field("models.recurrent.model_path", &self.model_path)?;
        let scaler_path =
            validate_required_field("models.recurrent.scaler_path", &self.scaler_path)?;
        validate_path("models.recurrent.model_path", model_path)?;
        validate_path("models.recurrent.scaler_path", scaler_path)?;
        validate_positive_number("models.recurrent.input_length", self.input_length, 1)?;
        validate_positive_number("models.recurrent.output_length", self.output_length, 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub order: ArimaOrder,
    #[serde(default)]
    pub seasonal_order: SeasonalOrder,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// 有值時改為載入已保存的模型，不重新估計。
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub save_path: Option<String>,
}

impl Default for SeasonalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            order: ArimaOrder::default(),
            seasonal_order: SeasonalOrder::default(),
            horizon: default_horizon(),
            model_path: None,
            save_path: None,
        }
    }
}

impl Validate for SeasonalSettings {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        validate_positive_number("models.seasonal.horizon", self.horizon, 1)?;
        if self.seasonal_order.is_seasonal() {
            validate_positive_number("models.seasonal.seasonal_order.period", self.seasonal_order.period, 2)?;
        }
        if let Some(path) = &self.model_path {
            validate_path("models.seasonal.model_path", path)?;
        }
        if let Some(path) = &self.save_path {
            validate_path("models.seasonal.save_path", path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_changepoints")]
    pub n_changepoints: usize,
    #[serde(default = "default_changepoint_prior_scale")]
    pub changepoint_prior_scale: f64,
    #[serde(default)]
    pub seasonality_mode: SeasonalityMode,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    #[serde(default)]
    pub freq: Frequency,
}

impl Default for DecompositionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            n_changepoints: default_changepoints(),
            changepoint_prior_scale: default_changepoint_prior_scale(),
            seasonality_mode: SeasonalityMode::default(),
            horizon: default_horizon(),
            freq: Frequency::default(),
        }
    }
}

impl Validate for DecompositionSettings {
    fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        validate_positive_float(
            "models.decomposition.changepoint_prior_scale",
            self.changepoint_prior_scale,
        )?;
        validate_positive_number("models.decomposition.horizon", self.horizon, 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub compress: bool,
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            formats: default_formats(),
            compress: false,
            archive_name: default_archive_name(),
        }
    }
}

impl Validate for OutputSettings {
    fn validate(&self) -> Result<()> {
        validate_path("output.output_path", &self.output_path)?;
        validate_positive_number("output.formats", self.formats.len(), 1)?;
        for format in &self.formats {
            validate_one_of("output.formats", format, &OUTPUT_FORMATS)?;
        }
        if self.compress {
            validate_file_extensions(
                "output.archive_name",
                std::slice::from_ref(&self.archive_name),
                &["zip"],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurrent_requires_artifacts_when_enabled() {
        let settings = RecurrentSettings::default();
        assert!(settings.validate().is_err());

        let disabled = RecurrentSettings {
            enabled: false,
            ..RecurrentSettings::default()
        };
        assert!(disabled.validate().is_ok());
    }

    #[test]
    fn test_source_accepts_csv_and_parquet_only() {
        assert!(SourceSettings::new("totals.xlsx").validate().is_err());
        assert!(SourceSettings::new("totals.csv").validate().is_ok());
        assert!(SourceSettings::new("totals.parquet").validate().is_ok());
    }

    #[test]
    fn test_output_rejects_unknown_format() {
        let settings = OutputSettings {
            formats: vec!["xlsx".to_string()],
            ..OutputSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_defaults_match_dashboard() {
        let seasonal = SeasonalSettings::default();
        assert_eq!(seasonal.order, ArimaOrder::new(0, 1, 2));
        assert_eq!(seasonal.seasonal_order, SeasonalOrder::new(1, 1, 1, 12));
        let decomposition = DecompositionSettings::default();
        assert_eq!(decomposition.n_changepoints, 25);
        assert_eq!(decomposition.seasonality_mode, SeasonalityMode::Multiplicative);
        assert_eq!(TreatmentSettings::default().iqr_multiplier, 1.125);
    }
}
