//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{AppConfig, BoomConfig, LogOutput, LogLevel, LoggingConfig, WorkerConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &BoomConfig) -> ConfigResult<()> {
    validate_app_config(&config.app)?;
    validate_worker_config(&config.workers)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_app_config(app: &AppConfig) -> ConfigResult<()> {
    if app.name.trim().is_empty() {
        return Err(ConfigError::missing_field("app.name"));
    }

    if app.response_timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "Response timeout must be greater than 0",
        ));
    }

    if app.router_cache_size == 0 {
        return Err(ConfigError::validation(
            "Router cache size must be greater than 0",
        ));
    }

    if app.resolver_cache_size == 0 {
        return Err(ConfigError::validation(
            "Resolver cache size must be greater than 0",
        ));
    }

    if app.clock_tick_ms == 0 {
        return Err(ConfigError::validation("Clock tick must be greater than 0"));
    }

    if let Some(server) = &app.server_name
        && (server.is_empty() || server.contains("://") || server.contains('/'))
    {
        return Err(ConfigError::validation(format!(
            "Server name must be a bare host, got `{server}`"
        )));
    }

    Ok(())
}

fn validate_worker_config(workers: &WorkerConfig) -> ConfigResult<()> {
    if workers.count == 0 {
        return Err(ConfigError::validation(
            "Worker count must be greater than 0",
        ));
    }

    if workers.queue_depth == 0 {
        return Err(ConfigError::validation(
            "Worker queue depth must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (module, level) in &logging.filters {
        if module.is_empty() || module.contains('=') {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target `{module}`"
            )));
        }
        level
            .parse::<LogLevel>()
            .map_err(|_| ConfigError::invalid_log_level(module, level))?;
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&BoomConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_values() {
        let mut config = BoomConfig::default();
        config.app.response_timeout_ms = Some(0);
        assert!(validate_config(&config).is_err());

        let mut config = BoomConfig::default();
        config.app.resolver_cache_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = BoomConfig::default();
        config.workers.count = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = BoomConfig::default();
        config
            .logging
            .filters
            .insert("boom_framework".to_string(), "chatty".to_string());

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidLogLevel { .. })));
    }

    #[test]
    fn test_validate_server_name() {
        let mut config = BoomConfig::default();
        config.app.server_name = Some("https://example.com".to_string());
        assert!(validate_config(&config).is_err());

        config.app.server_name = Some("example.com:8080".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = BoomConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
