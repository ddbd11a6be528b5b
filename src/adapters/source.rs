use crate::adapters::columnar::ParquetSource;
use crate::config::settings::SourceSettings;
use crate::domain::model::DailyRecord;
use crate::domain::ports::{RecordSource, Storage};
use crate::utils::error::{ForecastError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// 以 CSV 內容為來源的日資料，欄位名稱可設定。
#[derive(Debug, Clone)]
pub struct CsvSource {
    data: Vec<u8>,
    date_column: String,
    value_column: String,
}

impl CsvSource {
    pub fn from_bytes(
        data: Vec<u8>,
        date_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            data,
            date_column: date_column.into(),
            value_column: value_column.into(),
        }
    }

    pub fn from_storage<S: Storage + ?Sized>(storage: &S, settings: &SourceSettings) -> Result<Self> {
        let data = storage.read_file(&settings.path)?;
        tracing::debug!("Read {} bytes from {}", data.len(), settings.path);
        Ok(Self::from_bytes(
            data,
            settings.date_column.as_str(),
            settings.value_column.as_str(),
        ))
    }

    fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ForecastError::data(format!("required column '{}' not found", name)))
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, format).ok().map(|dt| dt.date()))
    })
}

/// 依副檔名挑選來源：`.parquet` 走欄式讀取，其餘當 CSV。
pub fn source_from_storage<S: Storage + ?Sized>(
    storage: &S,
    settings: &SourceSettings,
) -> Result<Box<dyn RecordSource>> {
    let is_parquet = Path::new(&settings.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        Ok(Box::new(ParquetSource::from_storage(storage, settings)?))
    } else {
        Ok(Box::new(CsvSource::from_storage(storage, settings)?))
    }
}

impl RecordSource for CsvSource {
    fn read_records(&self) -> Result<Vec<DailyRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(self.data.as_slice());

        let headers = reader.headers()?.clone();
        let date_idx = Self::column_index(&headers, &self.date_column)?;
        let value_idx = Self::column_index(&headers, &self.value_column)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (i, row) in reader.records().enumerate() {
            let row = row?;
            // 標頭為第 1 列
            let line = i + 2;

            let raw_value = row.get(value_idx).unwrap_or("");
            if raw_value.is_empty() {
                skipped += 1;
                continue;
            }

            let raw_date = row.get(date_idx).unwrap_or("");
            let date = parse_date(raw_date).ok_or_else(|| {
                ForecastError::data(format!("row {}: cannot parse date '{}'", line, raw_date))
            })?;
            let total = raw_value.parse::<f64>().map_err(|_| {
                ForecastError::data(format!("row {}: cannot parse value '{}'", line, raw_value))
            })?;

            records.push(DailyRecord { date, total });
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} rows with an empty '{}' cell", skipped, self.value_column);
        }
        Ok(records)
    }
}
