use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 本專案的 library 與兩個執行檔各自的 tracing target。
const OWN_TARGETS: [&str; 2] = ["monthly_forecast", "toml_forecast"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    /// 一行一筆 JSON，交給日誌收集器
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Compact
        }
    }
}

/// 沒有 RUST_LOG 時的過濾規則。verbose 蓋過設定檔等級；模型相關的外部 crate 只留警告。
pub fn filter_directive(verbose: bool, level: Option<&str>) -> String {
    let (own, others) = match (verbose, level) {
        (true, _) => ("debug", "info"),
        (false, Some(level)) => (level, "warn"),
        (false, None) => ("info", "warn"),
    };
    let mut directives: Vec<String> = OWN_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, own))
        .collect();
    directives.push(others.to_string());
    directives.join(",")
}

pub fn init_logger(format: LogFormat, verbose: bool, level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, level)));

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Json => registry.with(layer.json()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(
            filter_directive(false, None),
            "monthly_forecast=info,toml_forecast=info,warn"
        );
    }

    #[test]
    fn test_configured_level_applies_to_own_targets() {
        assert_eq!(
            filter_directive(false, Some("trace")),
            "monthly_forecast=trace,toml_forecast=trace,warn"
        );
    }

    #[test]
    fn test_verbose_wins_over_configured_level() {
        let directive = filter_directive(true, Some("error"));
        assert_eq!(directive, "monthly_forecast=debug,toml_forecast=debug,info");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Compact);
        assert_eq!(LogFormat::default(), LogFormat::Compact);
    }
}
