pub mod error;
pub mod logger;
pub mod monitor;
pub mod stats;
pub mod validation;
