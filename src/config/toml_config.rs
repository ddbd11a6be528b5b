use crate::config::settings::{
    DecompositionSettings, OutputSettings, RecurrentSettings, SeasonalSettings, SourceSettings,
    TreatmentSettings, WindowSettings,
};
use crate::core::ConfigProvider;
use crate::utils::error::{ForecastError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_one_of, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineInfo,
    pub source: SourceSettings,
    #[serde(default)]
    pub treatment: TreatmentSettings,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub output: OutputSettings,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub recurrent: RecurrentSettings,
    #[serde(default)]
    pub seasonal: SeasonalSettings,
    #[serde(default)]
    pub decomposition: DecompositionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ForecastError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ForecastError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ForecastError::ConfigValidationError {
            field: "environment".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }

    /// 有啟用的模型名稱
    pub fn enabled_models(&self) -> Vec<&'static str> {
        let mut models = Vec::new();
        if self.models.recurrent.enabled {
            models.push("recurrent");
        }
        if self.models.seasonal.enabled {
            models.push("seasonal");
        }
        if self.models.decomposition.enabled {
            models.push("decomposition");
        }
        models
    }
}

impl ConfigProvider for TomlConfig {
    fn source(&self) -> &SourceSettings {
        &self.source
    }

    fn treatment(&self) -> &TreatmentSettings {
        &self.treatment
    }

    fn window(&self) -> &WindowSettings {
        &self.window
    }

    fn recurrent(&self) -> &RecurrentSettings {
        &self.models.recurrent
    }

    fn seasonal(&self) -> &SeasonalSettings {
        &self.models.seasonal
    }

    fn decomposition(&self) -> &DecompositionSettings {
        &self.models.decomposition
    }

    fn output(&self) -> &OutputSettings {
        &self.output
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        self.source.validate()?;
        self.treatment.validate()?;
        self.models.recurrent.validate()?;
        self.models.seasonal.validate()?;
        self.models.decomposition.validate()?;
        self.output.validate()?;
        if let Some(level) = self.log_level() {
            validate_one_of("monitoring.log_level", level, &LOG_LEVELS)?;
        }
        Ok(())
    }
}
