pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{ComparisonReport, ForecastResult, TimeSeries};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use etl::ComparisonEngine;
pub use pipeline::ComparisonPipeline;
