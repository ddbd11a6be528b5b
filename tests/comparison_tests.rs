use monthly_forecast::config::toml_config::TomlConfig;
use monthly_forecast::core::Storage;
use monthly_forecast::utils::error::ErrorCategory;
use monthly_forecast::utils::validation::Validate;
use monthly_forecast::{ComparisonEngine, ComparisonPipeline, LocalStorage};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

/// 2019-01 至 2024-12，每月兩筆日資料；2023-03 是異常大的月份。
fn daily_csv() -> String {
    let mut csv = String::from("fecha,total_diario\n");
    for year in 2019..=2024 {
        for month in 1..=12u32 {
            let t = ((year - 2019) * 12 + month as i32 - 1) as f64;
            let mut total =
                48_000_000.0 + 250_000.0 * t + 4_000_000.0 * (t * std::f64::consts::PI / 6.0).sin();
            if year == 2023 && month == 3 {
                total *= 3.0;
            }
            csv.push_str(&format!("{}-{:02}-03,{}\n", year, month, total * 0.4));
            csv.push_str(&format!("{}-{:02}-17,{}\n", year, month, total * 0.6));
        }
    }
    csv
}

/// 一層 LSTM (全零權重)，dense 只有 bias，縮放到 [0, 100]。
const LSTM_MODEL: &str = r#"{
  "layers": [{"kernel": [[0, 0, 0, 0]], "recurrent_kernel": [[0, 0, 0, 0]], "bias": [0, 0, 0, 0]}],
  "dense": {"kernel": [[0, 0, 0, 0, 0, 0]], "bias": [0.5, 0.5, 0.5, 0.5, 0.5, 0.5]}
}"#;

const LSTM_SCALER: &str = r#"{"kind": "min_max", "data_min": 0.0, "data_max": 100.0}"#;

/// 同一份日資料寫成 Parquet (字串日期、浮點數值)。
fn daily_parquet() -> Vec<u8> {
    let mut dates = Vec::new();
    let mut totals = Vec::new();
    for line in daily_csv().lines().skip(1) {
        let (date, total) = line.split_once(',').unwrap();
        dates.push(date.to_string());
        totals.push(total.parse::<f64>().unwrap());
    }
    let schema = Arc::new(Schema::new(vec![
        Field::new("fecha", DataType::Utf8, false),
        Field::new("total_diario", DataType::Float64, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(dates)),
        Arc::new(Float64Array::from(totals)),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();
    let mut writer = ArrowWriter::try_new(Vec::new(), schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.into_inner().unwrap()
}

fn workspace() -> (TempDir, LocalStorage) {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage.write_file("data/totals.csv", daily_csv().as_bytes()).unwrap();
    storage.write_file("models/lstm.json", LSTM_MODEL.as_bytes()).unwrap();
    storage.write_file("models/scaler.json", LSTM_SCALER.as_bytes()).unwrap();
    (dir, storage)
}

fn config(output: &str) -> TomlConfig {
    let toml_content = format!(
        r#"
[pipeline]
name = "integration"

[source]
path = "data/totals.csv"

[window]
cutoff = "2024-11-01"
compare_from = "2023-01-01"

[models.recurrent]
model_path = "models/lstm.json"
scaler_path = "models/scaler.json"

[models.seasonal]
save_path = "models/sarima.json"

{}
"#,
        output
    );
    let config = TomlConfig::from_toml_str(&toml_content).unwrap();
    config.validate().unwrap();
    config
}

fn rows(csv_bytes: &[u8]) -> Vec<csv::StringRecord> {
    csv::Reader::from_reader(csv_bytes)
        .records()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_full_comparison_writes_csv_and_json() {
    let (dir, storage) = workspace();
    let config = config("[output]\noutput_path = \"out\"\nformats = [\"csv\", \"json\"]");
    let engine = ComparisonEngine::new(ComparisonPipeline::new(storage, config));

    let output_path = engine.run().unwrap();
    assert_eq!(output_path, "out");

    let series = rows(&std::fs::read(dir.path().join("out/series.csv")).unwrap());
    assert_eq!(series.len(), 72);
    assert_eq!(&series[0][0], "2019-01-01");

    // 異常月份被換掉，其餘月份維持原值
    let spike = series.iter().find(|r| &r[0] == "2023-03-01").unwrap();
    let original: f64 = spike[1].parse().unwrap();
    let treated: f64 = spike[2].parse().unwrap();
    assert!(treated < original);
    let april = series.iter().find(|r| &r[0] == "2023-04-01").unwrap();
    assert_eq!(april[1], april[2]);

    let forecasts = rows(&std::fs::read(dir.path().join("out/forecasts.csv")).unwrap());
    let dates_for = |model: &str| -> Vec<String> {
        forecasts
            .iter()
            .filter(|r| &r[0] == model)
            .map(|r| r[1].to_string())
            .collect()
    };

    let recurrent = dates_for("recurrent");
    assert_eq!(recurrent.len(), 6);
    assert_eq!(recurrent[0], "2024-12-01");
    assert!(forecasts
        .iter()
        .filter(|r| &r[0] == "recurrent")
        .all(|r| (r[2].parse::<f64>().unwrap() - 50.0).abs() < 1e-9));

    let seasonal = dates_for("seasonal");
    assert_eq!(
        seasonal,
        vec!["2024-12-01", "2025-01-01", "2025-02-01", "2025-03-01", "2025-04-01", "2025-05-01"]
    );

    let decomposition = dates_for("decomposition");
    assert_eq!(decomposition.first().map(String::as_str), Some("2023-01-01"));
    assert_eq!(decomposition.last().map(String::as_str), Some("2025-05-01"));
    assert_eq!(decomposition.len(), 29);

    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("out/report.json")).unwrap()).unwrap();
    assert_eq!(report["compare_from"], "2023-01-01");
    assert_eq!(report["forecasts"].as_array().unwrap().len(), 3);
    assert!(dir.path().join("models/sarima.json").exists());
}

#[test]
fn test_compressed_output_contains_all_files() {
    let (dir, storage) = workspace();
    let config = config(
        "[output]\noutput_path = \"out\"\nformats = [\"csv\", \"json\"]\ncompress = true\narchive_name = \"comparison.zip\"",
    );
    let engine = ComparisonEngine::new_with_monitoring(ComparisonPipeline::new(storage, config), true);

    let output_path = engine.run().unwrap();
    assert_eq!(output_path, "out/comparison.zip");

    let file = std::fs::File::open(dir.path().join("out/comparison.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    assert_eq!(names, vec!["forecasts.csv", "report.json", "series.csv"]);

    let mut series = String::new();
    archive
        .by_name("series.csv")
        .unwrap()
        .read_to_string(&mut series)
        .unwrap();
    assert!(series.starts_with("date,original,treated\n"));
}

#[test]
fn test_saved_seasonal_model_reused() {
    let (dir, storage) = workspace();
    let first = ComparisonEngine::new(ComparisonPipeline::new(
        storage.clone(),
        config("[output]\noutput_path = \"first\"\nformats = [\"csv\"]"),
    ));
    first.run().unwrap();

    let mut restored = config("[output]\noutput_path = \"second\"\nformats = [\"csv\"]");
    restored.models.seasonal.model_path = Some("models/sarima.json".to_string());
    restored.models.seasonal.save_path = None;
    let second = ComparisonEngine::new(ComparisonPipeline::new(storage, restored));
    second.run().unwrap();

    let seasonal_rows = |path: &str| -> Vec<Vec<String>> {
        rows(&std::fs::read(dir.path().join(path)).unwrap())
            .iter()
            .filter(|r| &r[0] == "seasonal")
            .map(|r| r.iter().map(String::from).collect())
            .collect()
    };
    assert_eq!(
        seasonal_rows("first/forecasts.csv"),
        seasonal_rows("second/forecasts.csv")
    );
}

#[test]
fn test_parquet_source_matches_csv_source() {
    let (dir, storage) = workspace();
    storage.write_file("data/totals.parquet", &daily_parquet()).unwrap();

    let mut from_csv = config("[output]\noutput_path = \"csv_run\"\nformats = [\"csv\"]");
    from_csv.models.recurrent.enabled = false;
    from_csv.models.seasonal.save_path = None;
    let mut from_parquet = from_csv.clone();
    from_parquet.source.path = "data/totals.parquet".to_string();
    from_parquet.output.output_path = "parquet_run".to_string();
    from_parquet.validate().unwrap();

    ComparisonEngine::new(ComparisonPipeline::new(storage.clone(), from_csv))
        .run()
        .unwrap();
    ComparisonEngine::new(ComparisonPipeline::new(storage, from_parquet))
        .run()
        .unwrap();

    let csv_series = std::fs::read(dir.path().join("csv_run/series.csv")).unwrap();
    let parquet_series = std::fs::read(dir.path().join("parquet_run/series.csv")).unwrap();
    assert_eq!(rows(&parquet_series).len(), 72);
    assert_eq!(csv_series, parquet_series);
}

#[test]
fn test_missing_value_column_is_data_error() {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(dir.path());
    storage
        .write_file("data/totals.csv", b"fecha,otro\n2024-01-01,1\n")
        .unwrap();

    let mut config = config("");
    config.models.recurrent.enabled = false;
    let engine = ComparisonEngine::new(ComparisonPipeline::new(storage, config));
    let err = engine.run().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Data);
}

#[test]
fn test_missing_source_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config("");
    config.models.recurrent.enabled = false;
    let engine = ComparisonEngine::new(ComparisonPipeline::new(LocalStorage::new(dir.path()), config));
    assert_eq!(engine.run().unwrap_err().category(), ErrorCategory::Io);
}
