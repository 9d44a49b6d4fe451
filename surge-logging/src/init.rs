use super::LoggingConfig;
use anyhow::Result;
use surge_config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Build the filter for a configuration
///
/// The configured level comes first, then `filter` directives. An unparsable
/// combination falls back to `RUST_LOG` and finally to `info`.
pub fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    let directives = match &config.filter {
        Some(extra) => format!("{},{}", config.level, extra),
        None => config.level.to_string(),
    };

    EnvFilter::try_new(directives)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize logging from configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_config::LogLevel;

    #[test]
    fn test_filter_includes_extra_directives() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("surge_http=debug".to_string()),
            ..LoggingConfig::default()
        };
        let rendered = build_env_filter(&config).to_string();
        assert!(rendered.contains("warn"));
        assert!(rendered.contains("surge_http=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
        assert!(init_simple_tracing("debug").is_ok());
    }
}
