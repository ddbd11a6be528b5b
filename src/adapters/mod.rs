// Adapters layer: concrete implementations for external collaborators
// (the CSV and Parquet input sources and the three forecasting models).

pub mod columnar;
pub mod forecast;
pub mod source;

pub use columnar::ParquetSource;
pub use source::{source_from_storage, CsvSource};
