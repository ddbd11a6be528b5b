use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行載入、處理與預測、輸出三個階段。
pub struct ComparisonEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ComparisonEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting forecast comparison");
        self.monitor.log_stats("Start");

        // Extract
        tracing::info!("📥 Loading monthly series...");
        let original = self.pipeline.extract()?;
        tracing::info!("📥 Loaded {} months", original.len());
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🔧 Treating outliers and running forecasts...");
        let report = self.pipeline.transform(original)?;
        tracing::info!(
            "🔧 Replaced {} outlier months, {} model forecast(s) ready",
            report.replaced_months(),
            report.forecasts.len()
        );
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing report...");
        let output_path = self.pipeline.load(report)?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ComparisonReport, OutlierBounds, TimeSeries};
    use crate::utils::error::ForecastError;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct RecordingPipeline {
        calls: Mutex<Vec<&'static str>>,
        fail_transform: bool,
    }

    impl RecordingPipeline {
        fn new(fail_transform: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_transform,
            }
        }
    }

    impl Pipeline for RecordingPipeline {
        fn extract(&self) -> Result<TimeSeries> {
            self.calls.lock().unwrap().push("extract");
            TimeSeries::from_values(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), &[1.0, 2.0])
        }

        fn transform(&self, original: TimeSeries) -> Result<ComparisonReport> {
            self.calls.lock().unwrap().push("transform");
            if self.fail_transform {
                return Err(ForecastError::model("boom"));
            }
            Ok(ComparisonReport {
                compare_from: original.first_date().unwrap(),
                treated: original.clone(),
                original,
                bounds: OutlierBounds::default(),
                forecasts: Vec::new(),
            })
        }

        fn load(&self, _report: ComparisonReport) -> Result<String> {
            self.calls.lock().unwrap().push("load");
            Ok("out".to_string())
        }
    }

    #[test]
    fn test_runs_phases_in_order() {
        let engine = ComparisonEngine::new(RecordingPipeline::new(false));
        assert_eq!(engine.run().unwrap(), "out");
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform", "load"]
        );
    }

    #[test]
    fn test_stops_on_first_error() {
        let engine = ComparisonEngine::new_with_monitoring(RecordingPipeline::new(true), false);
        assert!(engine.run().is_err());
        assert_eq!(
            *engine.pipeline().calls.lock().unwrap(),
            vec!["extract", "transform"]
        );
    }
}
