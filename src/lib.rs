pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use adapters::forecast::{DecompositionAdapter, RecurrentAdapter, SeasonalAdapter};
pub use adapters::{CsvSource, ParquetSource};
pub use config::toml_config::TomlConfig;
pub use core::{etl::ComparisonEngine, pipeline::ComparisonPipeline};
pub use utils::error::{ForecastError, Result};
