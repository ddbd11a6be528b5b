#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_config::{CliArgs, CliConfig};

#[cfg(feature = "cli")]
mod cli_config {
    use super::settings::{
        DecompositionSettings, OutputSettings, RecurrentSettings, SeasonalSettings,
        SourceSettings, TreatmentSettings, WindowSettings,
    };
    use crate::adapters::forecast::{ArimaOrder, SeasonalOrder, SeasonalityMode};
    use crate::core::ConfigProvider;
    use crate::domain::calendar::Frequency;
    use crate::utils::error::Result;
    use crate::utils::logger::LogFormat;
    use crate::utils::validation::Validate;
    use chrono::NaiveDate;
    use clap::Parser;

    fn parse_counts(s: &str, expected: usize) -> std::result::Result<Vec<usize>, String> {
        let parts: std::result::Result<Vec<usize>, _> =
            s.split(',').map(|p| p.trim().parse::<usize>()).collect();
        match parts {
            Ok(parts) if parts.len() == expected => Ok(parts),
            _ => Err(format!("expected {} comma-separated non-negative integers, got '{}'", expected, s)),
        }
    }

    fn parse_arima_order(s: &str) -> std::result::Result<ArimaOrder, String> {
        let v = parse_counts(s, 3)?;
        Ok(ArimaOrder::new(v[0], v[1], v[2]))
    }

    fn parse_seasonal_order(s: &str) -> std::result::Result<SeasonalOrder, String> {
        let v = parse_counts(s, 4)?;
        Ok(SeasonalOrder::new(v[0], v[1], v[2], v[3]))
    }

    #[derive(Debug, Clone, Parser)]
    #[command(name = "monthly-forecast")]
    #[command(about = "Clean a monthly series and compare three forecasting models")]
    pub struct CliArgs {
        /// CSV or Parquet file with daily totals
        #[arg(long)]
        pub source: String,

        #[arg(long, default_value = "fecha")]
        pub date_column: String,

        #[arg(long, default_value = "total_diario")]
        pub value_column: String,

        #[arg(long, help = "First month to keep (YYYY-MM-DD)")]
        pub start: Option<NaiveDate>,

        #[arg(long, help = "Last month to keep (YYYY-MM-DD)")]
        pub end: Option<NaiveDate>,

        #[arg(long, help = "Latest date used for fitting and forecasting")]
        pub cutoff: Option<NaiveDate>,

        #[arg(long, help = "First month shown in the comparison")]
        pub compare_from: Option<NaiveDate>,

        #[arg(long, default_value_t = crate::domain::services::outliers::DEFAULT_IQR_MULTIPLIER)]
        pub iqr_multiplier: f64,

        #[arg(long, help = "Skip the recurrent network forecast")]
        pub no_recurrent: bool,

        #[arg(long, help = "Skip the seasonal statistical forecast")]
        pub no_seasonal: bool,

        #[arg(long, help = "Skip the decomposition forecast")]
        pub no_decomposition: bool,

        #[arg(long, help = "Recurrent network weights (JSON)")]
        pub lstm_model: Option<String>,

        #[arg(long, help = "Recurrent network scaler (JSON)")]
        pub lstm_scaler: Option<String>,

        #[arg(long, default_value = "12")]
        pub input_length: usize,

        #[arg(long, default_value = "6")]
        pub output_length: usize,

        #[arg(long, default_value = "0,1,2", value_parser = parse_arima_order)]
        pub order: ArimaOrder,

        #[arg(long, default_value = "1,1,1,12", value_parser = parse_seasonal_order)]
        pub seasonal_order: SeasonalOrder,

        #[arg(long, default_value = "6")]
        pub horizon: usize,

        #[arg(long, help = "Restore the seasonal model from this file instead of fitting")]
        pub sarima_model: Option<String>,

        #[arg(long, help = "Save the fitted seasonal model to this file")]
        pub sarima_save: Option<String>,

        #[arg(long, default_value = "25")]
        pub changepoints: usize,

        #[arg(long, default_value = "1.25")]
        pub changepoint_prior_scale: f64,

        #[arg(long, default_value = "multiplicative")]
        pub seasonality_mode: SeasonalityMode,

        #[arg(long, default_value = "MS")]
        pub freq: Frequency,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        #[arg(long, value_delimiter = ',', default_value = "csv")]
        pub formats: Vec<String>,

        #[arg(long, help = "Bundle the output files into a zip archive")]
        pub compress: bool,

        #[arg(long, default_value = "forecast_output.zip")]
        pub archive_name: String,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Log system resource usage per phase")]
        pub monitor: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub json_logs: bool,

        #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
        pub log_level: Option<String>,
    }

    /// 命令列參數整理成各段設定。
    #[derive(Debug, Clone)]
    pub struct CliConfig {
        pub source: SourceSettings,
        pub treatment: TreatmentSettings,
        pub window: WindowSettings,
        pub recurrent: RecurrentSettings,
        pub seasonal: SeasonalSettings,
        pub decomposition: DecompositionSettings,
        pub output: OutputSettings,
        pub verbose: bool,
        pub monitor: bool,
        pub json_logs: bool,
        pub log_level: Option<String>,
    }

    impl CliConfig {
        pub fn parse() -> Self {
            Self::from(CliArgs::parse())
        }

        pub fn log_format(&self) -> LogFormat {
            LogFormat::from_json_flag(self.json_logs)
        }
    }

    impl From<CliArgs> for CliConfig {
        fn from(args: CliArgs) -> Self {
            Self {
                source: SourceSettings {
                    path: args.source,
                    date_column: args.date_column,
                    value_column: args.value_column,
                    start: args.start,
                    end: args.end,
                },
                treatment: TreatmentSettings {
                    iqr_multiplier: args.iqr_multiplier,
                },
                window: WindowSettings {
                    cutoff: args.cutoff,
                    compare_from: args.compare_from,
                },
                recurrent: RecurrentSettings {
                    enabled: !args.no_recurrent,
                    model_path: args.lstm_model,
                    scaler_path: args.lstm_scaler,
                    input_length: args.input_length,
                    output_length: args.output_length,
                },
                seasonal: SeasonalSettings {
                    enabled: !args.no_seasonal,
                    order: args.order,
                    seasonal_order: args.seasonal_order,
                    horizon: args.horizon,
                    model_path: args.sarima_model,
                    save_path: args.sarima_save,
                },
                decomposition: DecompositionSettings {
                    enabled: !args.no_decomposition,
                    n_changepoints: args.changepoints,
                    changepoint_prior_scale: args.changepoint_prior_scale,
                    seasonality_mode: args.seasonality_mode,
                    horizon: args.horizon,
                    freq: args.freq,
                },
                output: OutputSettings {
                    output_path: args.output_path,
                    formats: args.formats,
                    compress: args.compress,
                    archive_name: args.archive_name,
                },
                verbose: args.verbose,
                monitor: args.monitor,
                json_logs: args.json_logs,
                log_level: args.log_level,
            }
        }
    }

    impl ConfigProvider for CliConfig {
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
            &self.recurrent
        }

        fn seasonal(&self) -> &SeasonalSettings {
            &self.seasonal
        }

        fn decomposition(&self) -> &DecompositionSettings {
            &self.decomposition
        }

        fn output(&self) -> &OutputSettings {
            &self.output
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            self.source.validate()?;
            self.treatment.validate()?;
            self.recurrent.validate()?;
            self.seasonal.validate()?;
            self.decomposition.validate()?;
            self.output.validate()
        }
    }

}
