use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("Tensor error: {0}")]
    TensorError(#[from] candle_core::Error),

    #[error("Data error: {message}")]
    DataError { message: String },

    #[error("State error: {message}")]
    StateError { message: String },

    #[error("Model error: {message}")]
    ModelError { message: String },

    #[error("Insufficient history: need at least {needed} observations, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Data,
    State,
    Model,
    Config,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ForecastError {
    pub fn data(message: impl Into<String>) -> Self {
        Self::DataError {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DataError { .. }
            | Self::CsvError(_)
            | Self::ParquetError(_)
            | Self::ArrowError(_) => ErrorCategory::Data,
            Self::StateError { .. } => ErrorCategory::State,
            Self::ModelError { .. } | Self::TensorError(_) | Self::InsufficientHistory { .. } => {
                ErrorCategory::Model
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Config,
            Self::ZipError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::Io
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::State => ErrorSeverity::Critical,
            ErrorCategory::Model => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::DataError { .. }
            | Self::CsvError(_)
            | Self::ParquetError(_)
            | Self::ArrowError(_) => {
                "Check that the source file has the date and total columns and at least one row in range"
            }
            Self::StateError { .. } => "Load a series before running outlier treatment",
            Self::InsufficientHistory { .. } => {
                "Move the cutoff date later or reduce the model input window"
            }
            Self::ModelError { .. } | Self::TensorError(_) => {
                "Check the model artifacts and the model orders"
            }
            Self::ConfigError { .. } => "Provide a start date or fit the model from a series",
            Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => {
                "Fix the configuration value and run again"
            }
            Self::ZipError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                "Check that the paths exist and are readable and writable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InsufficientHistory { needed, got } => format!(
                "Not enough history to forecast: {} months needed, {} available",
                needed, got
            ),
            Self::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<anofox_forecast::error::ForecastError> for ForecastError {
    fn from(err: anofox_forecast::error::ForecastError) -> Self {
        match err {
            anofox_forecast::error::ForecastError::InsufficientData { needed, got, .. } => {
                Self::InsufficientHistory { needed, got }
            }
            other => Self::model(format!("seasonal estimation failed: {}", other)),
        }
    }
}

impl From<augurs::prophet::Error> for ForecastError {
    fn from(err: augurs::prophet::Error) -> Self {
        Self::model(format!("decomposition fit failed: {}", err))
    }
}
