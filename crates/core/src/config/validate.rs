use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Ingestion sizes and retry attempts are at least 1
/// - Countdown tick interval is non-zero
/// - Session history keeps at least one entry
/// - The script fallback template is not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.ingest.max_fetch_size == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.max_fetch_size must be at least 1".to_string(),
        ));
    }

    if config.ingest.max_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.max_batch_size must be at least 1".to_string(),
        ));
    }

    if config.ingest.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "ingest.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.explain.tick_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "explain.tick_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.session.max_history == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_history must be at least 1".to_string(),
        ));
    }

    if config.script.template.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "script.template must not be blank".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_batch_size_fails() {
        let mut config = Config::default();
        config.ingest.max_batch_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retry_attempts_fails() {
        let mut config = Config::default();
        config.ingest.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_blank_template_fails() {
        let mut config = Config::default();
        config.script.template = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("script.template"));
    }

    #[test]
    fn test_validate_zero_history_fails() {
        let mut config = Config::default();
        config.session.max_history = 0;
        assert!(validate_config(&config).is_err());
    }
}
