use anyhow::Context;
use clap::Parser;
use monthly_forecast::config::toml_config::TomlConfig;
use monthly_forecast::utils::error::ErrorSeverity;
use monthly_forecast::utils::logger::{self, LogFormat};
use monthly_forecast::utils::validation::Validate;
use monthly_forecast::{ComparisonEngine, ComparisonPipeline, LocalStorage};

#[derive(Parser)]
#[command(name = "toml-forecast")]
#[command(about = "Forecast comparison driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "forecast.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show what would run without reading data or fitting models
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 日誌等級來自設定檔，所以先讀設定
    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    logger::init_logger(LogFormat::Compact, args.verbose, config.log_level());

    tracing::info!("🚀 Starting TOML-based forecast comparison");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = ComparisonPipeline::new(LocalStorage::default(), config);
    let engine = ComparisonEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run() {
        Ok(output_path) => {
            tracing::info!("✅ Forecast comparison completed successfully!");
            println!("✅ Forecast comparison completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Forecast comparison failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Source: {}", config.source.path);
    println!(
        "  Columns: {} / {}",
        config.source.date_column, config.source.value_column
    );
    if let Some(cutoff) = config.window.cutoff {
        println!("  Cutoff: {}", cutoff);
    }
    println!("  IQR multiplier: {}", config.treatment.iqr_multiplier);
    println!("  Models: {}", config.enabled_models().join(", "));

    let seasonal = &config.models.seasonal;
    if seasonal.enabled {
        let order = seasonal.order;
        let s = seasonal.seasonal_order;
        println!(
            "  SARIMA: ({}, {}, {}) x ({}, {}, {}, {}), horizon {}",
            order.p, order.d, order.q, s.p, s.d, s.q, s.period, seasonal.horizon
        );
    }

    println!("  Output: {}", config.output.output_path);
    println!("  Formats: {}", config.output.formats.join(", "));
    if config.output.compress {
        println!("  Compression: {} (ZIP)", config.output.archive_name);
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
