use crate::adapters::source::parse_date;
use crate::config::settings::SourceSettings;
use crate::domain::model::DailyRecord;
use crate::domain::ports::{RecordSource, Storage};
use crate::utils::error::{ForecastError, Result};
use arrow::array::{Array, ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Parquet 檔的日資料。日期欄可為 date、timestamp 或字串，數值欄可為任何數字型別。
#[derive(Debug, Clone)]
pub struct ParquetSource {
    data: Bytes,
    date_column: String,
    value_column: String,
}

enum DateColumn {
    Native(Date32Array),
    Text(StringArray),
}

impl DateColumn {
    fn from_array(array: &ArrayRef) -> Result<Self> {
        match array.data_type() {
            DataType::Utf8 | DataType::LargeUtf8 => {
                let text = cast(array, &DataType::Utf8)?;
                let text = text
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .ok_or_else(|| ForecastError::data("date column is not a string array"))?;
                Ok(Self::Text(text.clone()))
            }
            _ => {
                let dates = cast(array, &DataType::Date32)?;
                let dates = dates
                    .as_any()
                    .downcast_ref::<Date32Array>()
                    .ok_or_else(|| ForecastError::data("date column cannot be read as dates"))?;
                Ok(Self::Native(dates.clone()))
            }
        }
    }

    fn is_null(&self, row: usize) -> bool {
        match self {
            Self::Native(array) => array.is_null(row),
            Self::Text(array) => array.is_null(row),
        }
    }

    fn raw(&self, row: usize) -> String {
        match self {
            Self::Native(array) => array.value(row).to_string(),
            Self::Text(array) => array.value(row).to_string(),
        }
    }

    fn date(&self, row: usize) -> Option<NaiveDate> {
        if self.is_null(row) {
            return None;
        }
        match self {
            Self::Native(array) => array.value_as_date(row),
            Self::Text(array) => parse_date(array.value(row)),
        }
    }
}

impl ParquetSource {
    pub fn from_bytes(
        data: impl Into<Bytes>,
        date_column: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            date_column: date_column.into(),
            value_column: value_column.into(),
        }
    }

    pub fn from_storage<S: Storage + ?Sized>(storage: &S, settings: &SourceSettings) -> Result<Self> {
        let data = storage.read_file(&settings.path)?;
        tracing::debug!("Read {} parquet bytes from {}", data.len(), settings.path);
        Ok(Self::from_bytes(
            data,
            settings.date_column.as_str(),
            settings.value_column.as_str(),
        ))
    }

    fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
        batch
            .column_by_name(name)
            .ok_or_else(|| ForecastError::data(format!("required column '{}' not found", name)))
    }

    fn values(array: &ArrayRef) -> Result<Float64Array> {
        let values = cast(array, &DataType::Float64)?;
        values
            .as_any()
            .downcast_ref::<Float64Array>()
            .cloned()
            .ok_or_else(|| ForecastError::data("value column cannot be read as numbers"))
    }
}

impl RecordSource for ParquetSource {
    fn read_records(&self) -> Result<Vec<DailyRecord>> {
        let reader = ParquetRecordBatchReaderBuilder::try_new(self.data.clone())?.build()?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        let mut offset = 0usize;
        for batch in reader {
            let batch = batch?;
            let dates = DateColumn::from_array(Self::column(&batch, &self.date_column)?)?;
            let values = Self::values(Self::column(&batch, &self.value_column)?)?;

            for row in 0..batch.num_rows() {
                if values.is_null(row) {
                    skipped += 1;
                    continue;
                }
                let date = dates.date(row).ok_or_else(|| {
                    let raw = if dates.is_null(row) { String::new() } else { dates.raw(row) };
                    ForecastError::data(format!("row {}: cannot parse date '{}'", offset + row + 1, raw))
                })?;
                records.push(DailyRecord {
                    date,
                    total: values.value(row),
                });
            }
            offset += batch.num_rows();
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} rows with a null '{}' value", skipped, self.value_column);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    fn write_parquet(schema: Schema, columns: Vec<ArrayRef>) -> Vec<u8> {
        let schema = Arc::new(schema);
        let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
        let mut writer = ArrowWriter::try_new(Vec::new(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.into_inner().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reads_native_dates_and_floats() {
        // 2024-01-05 = 19727 天
        let bytes = write_parquet(
            Schema::new(vec![
                Field::new("fecha", DataType::Date32, false),
                Field::new("total_diario", DataType::Float64, true),
            ]),
            vec![
                Arc::new(Date32Array::from(vec![19727, 19728])),
                Arc::new(Float64Array::from(vec![Some(1000.0), Some(2500.5)])),
            ],
        );
        let records = ParquetSource::from_bytes(bytes, "fecha", "total_diario")
            .read_records()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(2024, 1, 5));
        assert_eq!(records[1].date, date(2024, 1, 6));
        assert_eq!(records[1].total, 2500.5);
    }

    #[test]
    fn test_reads_text_dates_and_integers() {
        let bytes = write_parquet(
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("fecha", DataType::Utf8, false),
                Field::new("total_diario", DataType::Int64, true),
            ]),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["2024-02-29", "2024-03-01 00:00:00", "2024-03-02"])),
                Arc::new(Int64Array::from(vec![Some(7), None, Some(9)])),
            ],
        );
        let records = ParquetSource::from_bytes(bytes, "fecha", "total_diario")
            .read_records()
            .unwrap();
        // null 數值略過
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, date(2024, 2, 29));
        assert_eq!(records[1].total, 9.0);
    }

    #[test]
    fn test_missing_column_is_data_error() {
        let bytes = write_parquet(
            Schema::new(vec![Field::new("date", DataType::Date32, false)]),
            vec![Arc::new(Date32Array::from(vec![19727]))],
        );
        let err = ParquetSource::from_bytes(bytes, "fecha", "total_diario")
            .read_records()
            .unwrap_err();
        assert!(matches!(err, ForecastError::DataError { .. }));
        assert!(err.to_string().contains("fecha"));
    }

    #[test]
    fn test_bad_text_date_names_row() {
        let bytes = write_parquet(
            Schema::new(vec![
                Field::new("fecha", DataType::Utf8, false),
                Field::new("total_diario", DataType::Float64, false),
            ]),
            vec![
                Arc::new(StringArray::from(vec!["2024-01-05", "05/01/2024"])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
            ],
        );
        let err = ParquetSource::from_bytes(bytes, "fecha", "total_diario")
            .read_records()
            .unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_not_parquet_is_data_category() {
        let err = ParquetSource::from_bytes(b"fecha,total_diario\n".to_vec(), "fecha", "total_diario")
            .read_records()
            .unwrap_err();
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Data);
    }
}
