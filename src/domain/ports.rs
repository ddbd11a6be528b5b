use crate::config::settings::{
    DecompositionSettings, OutputSettings, RecurrentSettings, SeasonalSettings, SourceSettings,
    TreatmentSettings, WindowSettings,
};
use crate::domain::model::{ComparisonReport, DailyRecord, TimeSeries};
use crate::utils::error::Result;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// 原始日資料來源 (欄位解析由實作負責)。
pub trait RecordSource {
    fn read_records(&self) -> Result<Vec<DailyRecord>>;
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> &SourceSettings;
    fn treatment(&self) -> &TreatmentSettings;
    fn window(&self) -> &WindowSettings;
    fn recurrent(&self) -> &RecurrentSettings;
    fn seasonal(&self) -> &SeasonalSettings;
    fn decomposition(&self) -> &DecompositionSettings;
    fn output(&self) -> &OutputSettings;
}

pub trait Pipeline {
    fn extract(&self) -> Result<TimeSeries>;
    fn transform(&self, original: TimeSeries) -> Result<ComparisonReport>;
    fn load(&self, report: ComparisonReport) -> Result<String>;
}

/// 已訓練好的多步序列模型：輸入一段 (已縮放的) 視窗，一次輸出全部未來步。
pub trait SequenceModel {
    fn predict(&self, window: &[f64]) -> Result<Vec<f64>>;
    fn output_len(&self) -> usize;
}
