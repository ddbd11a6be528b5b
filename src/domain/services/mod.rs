pub mod loader;
pub mod outliers;
pub mod preprocessor;

pub use loader::SeriesLoader;
pub use outliers::OutlierTreater;
pub use preprocessor::Preprocessor;
