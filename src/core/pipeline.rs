use crate::adapters::forecast::{
    DecompositionAdapter, DecompositionConfig, RecurrentAdapter, RecurrentConfig, SeasonalAdapter,
};
use crate::adapters::source_from_storage;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::calendar::{month_start, next_month_start, sub_months};
use crate::domain::model::{ComparisonReport, ForecastResult, ModelForecast, ModelKind, TimeSeries};
use crate::domain::services::{OutlierTreater, Preprocessor, SeriesLoader};
use crate::utils::error::{ForecastError, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use zip::write::{FileOptions, ZipWriter};

/// 比較畫面至少要保留的月數 (比較起點最晚為最後一期往前 12 個月)。
const MIN_COMPARISON_MONTHS: u32 = 12;

pub struct ComparisonPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    preprocessor: Mutex<Preprocessor>,
}

impl<S: Storage, C: ConfigProvider> ComparisonPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        let treater = OutlierTreater::new(config.treatment().iqr_multiplier);
        Self {
            storage,
            config,
            preprocessor: Mutex::new(Preprocessor::new(SeriesLoader::new(), treater)),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn preprocessor(&self) -> Result<MutexGuard<'_, Preprocessor>> {
        self.preprocessor
            .lock()
            .map_err(|_| ForecastError::state("preprocessor lock poisoned"))
    }

    /// 未指定時取第一個月；指定時必須落在 [第一個月, 最後一個月 - 12 個月]。
    fn resolve_compare_from(&self, treated: &TimeSeries) -> Result<NaiveDate> {
        let (first, last) = match (treated.first_date(), treated.last_date()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ForecastError::data("treated series is empty")),
        };
        let Some(requested) = self.config.window().compare_from else {
            return Ok(first);
        };

        let requested = month_start(requested);
        let latest = sub_months(last, MIN_COMPARISON_MONTHS)?;
        if requested < first || requested > latest {
            return Err(ForecastError::config(format!(
                "compare_from {} must be between {} and {}",
                requested, first, latest
            )));
        }
        Ok(requested)
    }

    fn run_recurrent(&self, series: &TimeSeries, cutoff: Option<NaiveDate>) -> Result<ForecastResult> {
        let settings = self.config.recurrent();
        let model_path = settings
            .model_path
            .as_deref()
            .ok_or_else(|| ForecastError::MissingConfigError {
                field: "models.recurrent.model_path".to_string(),
            })?;
        let scaler_path = settings
            .scaler_path
            .as_deref()
            .ok_or_else(|| ForecastError::MissingConfigError {
                field: "models.recurrent.scaler_path".to_string(),
            })?;

        let adapter = RecurrentAdapter::from_artifacts(
            &self.storage.read_file(model_path)?,
            &self.storage.read_file(scaler_path)?,
            RecurrentConfig::from(settings),
        )?;
        adapter.forecast(series, cutoff)
    }

    fn run_seasonal(&self, series: &TimeSeries, cutoff: Option<NaiveDate>) -> Result<ForecastResult> {
        let settings = self.config.seasonal();

        let adapter = match &settings.model_path {
            Some(path) => {
                tracing::info!("📦 Restoring seasonal model from {}", path);
                SeasonalAdapter::from_persisted(&self.storage.read_file(path)?)?
            }
            None => SeasonalAdapter::from_series(series, settings.order, settings.seasonal_order, cutoff)?,
        };

        if let Some(path) = &settings.save_path {
            self.storage.write_file(path, &adapter.to_bytes()?)?;
            tracing::info!("💾 Seasonal model saved to {}", path);
        }

        // 還原的模型沒有最後日期，改用截止後序列的下一個月
        let start = match adapter.last_date() {
            Some(_) => None,
            None => {
                let history = match cutoff {
                    Some(cutoff) => series.until(cutoff),
                    None => series.clone(),
                };
                let last = history
                    .last_date()
                    .ok_or_else(|| ForecastError::data("no observations before the cutoff"))?;
                Some(next_month_start(last)?)
            }
        };
        adapter.forecast_with_interval(settings.horizon, start)
    }

    fn run_decomposition(
        &self,
        series: &TimeSeries,
        cutoff: Option<NaiveDate>,
        compare_from: NaiveDate,
    ) -> Result<ForecastResult> {
        let settings = self.config.decomposition();
        let history = match cutoff {
            Some(cutoff) => series.until(cutoff),
            None => series.clone(),
        };

        let mut adapter = DecompositionAdapter::new(DecompositionConfig::from(settings));
        adapter.train(&history)?;
        let forecast = adapter.forecast(settings.horizon, settings.freq)?;
        Ok(DecompositionAdapter::restrict_from(&forecast, compare_from))
    }

    fn series_csv(report: &ComparisonReport) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["date", "original", "treated"])?;
        for (original, treated) in report.original.iter().zip(report.treated.iter()) {
            writer.write_record([
                original.date.to_string(),
                original.value.to_string(),
                treated.value.to_string(),
            ])?;
        }
        writer
            .into_inner()
            .map_err(|e| ForecastError::IoError(e.into_error()))
    }

    fn forecasts_csv(report: &ComparisonReport) -> Result<Vec<u8>> {
        let optional = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["model", "date", "prediction", "lower", "upper"])?;
        for forecast in &report.forecasts {
            for point in forecast.result.iter() {
                writer.write_record([
                    forecast.model.to_string(),
                    point.date.to_string(),
                    point.value.to_string(),
                    optional(point.lower),
                    optional(point.upper),
                ])?;
            }
        }
        writer
            .into_inner()
            .map_err(|e| ForecastError::IoError(e.into_error()))
    }

    fn output_files(&self, report: &ComparisonReport) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let mut files = Vec::new();
        for format in &self.config.output().formats {
            match format.as_str() {
                "csv" => {
                    files.push(("series.csv", Self::series_csv(report)?));
                    files.push(("forecasts.csv", Self::forecasts_csv(report)?));
                }
                "json" => files.push(("report.json", serde_json::to_vec_pretty(report)?)),
                other => {
                    return Err(ForecastError::InvalidConfigValueError {
                        field: "output.formats".to_string(),
                        value: other.to_string(),
                        reason: "Supported formats: csv, json".to_string(),
                    })
                }
            }
        }
        Ok(files)
    }
}

impl<S: Storage, C: ConfigProvider> Pipeline for ComparisonPipeline<S, C> {
    fn extract(&self) -> Result<TimeSeries> {
        let settings = self.config.source();
        let source = source_from_storage(&self.storage, settings)?;
        self.preprocessor()?.load(source.as_ref(), settings.start, settings.end)
    }

    fn transform(&self, original: TimeSeries) -> Result<ComparisonReport> {
        let (treated, bounds) = {
            let mut preprocessor = self.preprocessor()?;
            let treated = preprocessor.treat_series(&original)?;
            let bounds = preprocessor.bounds().cloned().unwrap_or_default();
            (treated, bounds)
        };

        let compare_from = self.resolve_compare_from(&treated)?;
        let cutoff = self.config.window().cutoff;
        if let Some(cutoff) = cutoff {
            tracing::debug!("Forecast cutoff: {}", cutoff);
        }

        let mut forecasts = Vec::new();
        if self.config.recurrent().enabled {
            let result = self.run_recurrent(&treated, cutoff)?;
            tracing::info!("🧠 Recurrent forecast: {} rows", result.len());
            forecasts.push(ModelForecast {
                model: ModelKind::Recurrent,
                result,
            });
        }
        if self.config.seasonal().enabled {
            let result = self.run_seasonal(&treated, cutoff)?;
            tracing::info!("📈 Seasonal forecast: {} rows", result.len());
            forecasts.push(ModelForecast {
                model: ModelKind::Seasonal,
                result,
            });
        }
        if self.config.decomposition().enabled {
            let result = self.run_decomposition(&treated, cutoff, compare_from)?;
            tracing::info!("📉 Decomposition forecast: {} rows from {}", result.len(), compare_from);
            forecasts.push(ModelForecast {
                model: ModelKind::Decomposition,
                result,
            });
        }

        Ok(ComparisonReport {
            original,
            treated,
            compare_from,
            bounds,
            forecasts,
        })
    }

    fn load(&self, report: ComparisonReport) -> Result<String> {
        let output = self.config.output();
        let files = self.output_files(&report)?;

        if output.compress {
            let output_path = format!("{}/{}", output.output_path, output.archive_name);
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file::<_, ()>(*name, FileOptions::default())?;
                    zip.write_all(data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&output_path, &zip_data)?;
            return Ok(output_path);
        }

        for (name, data) in &files {
            let path = format!("{}/{}", output.output_path, name);
            tracing::debug!("Writing {} ({} bytes)", path, data.len());
            self.storage.write_file(&path, data)?;
        }
        Ok(output.output_path.clone())
    }
}
