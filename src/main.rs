use monthly_forecast::utils::error::ErrorSeverity;
use monthly_forecast::utils::{logger, validation::Validate};
use monthly_forecast::{CliConfig, ComparisonEngine, ComparisonPipeline, LocalStorage};

fn main() {
    let config = CliConfig::parse();

    logger::init_logger(config.log_format(), config.verbose, config.log_level.as_deref());

    tracing::info!("Starting monthly-forecast CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 路徑一律由設定決定，儲存根目錄為工作目錄
    let storage = LocalStorage::default();
    let pipeline = ComparisonPipeline::new(storage, config);
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

            // 依嚴重程度決定退出碼
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
}
