use crate::config::types::{Config, FetcherConfig, StorageConfig, WebhookConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_storage_config(&config.storage)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_webhook_config(&config.webhook)?;
    validate_flag_outlives_probe(config)?;
    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if !config.redis_url.starts_with("redis://") && !config.redis_url.starts_with("rediss://") {
        return Err(ConfigError::Validation(format!(
            "redis-url must use the redis:// or rediss:// scheme, got '{}'",
            config.redis_url
        )));
    }

    if config.check_flag_ttl == 0 {
        return Err(ConfigError::Validation(
            "check-flag-ttl must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.head_timeout == 0 {
        return Err(ConfigError::Validation(
            "head-timeout must be >= 1 second".to_string(),
        ));
    }

    if config.get_timeout == 0 {
        return Err(ConfigError::Validation(
            "get-timeout must be >= 1 second".to_string(),
        ));
    }

    if config.max_concurrent_probes < 1 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-probes must be >= 1, got {}",
            config.max_concurrent_probes
        )));
    }

    for domain in &config.get_only_domains {
        if domain.is_empty() || !domain.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "get-only-domains entry '{}' is not a valid domain",
                domain
            )));
        }
    }

    Ok(())
}

/// Validates webhook configuration
fn validate_webhook_config(config: &WebhookConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.backoff_factor < 1 {
        return Err(ConfigError::Validation(
            "backoff-factor must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout == 0 || config.total_timeout == 0 {
        return Err(ConfigError::Validation(
            "webhook timeouts must be >= 1 second".to_string(),
        ));
    }

    if config.total_timeout < config.connect_timeout {
        return Err(ConfigError::Validation(format!(
            "total-timeout ({}s) cannot be shorter than connect-timeout ({}s)",
            config.total_timeout, config.connect_timeout
        )));
    }

    Ok(())
}

/// The check-flag must outlive the slowest possible probe, or a live probe
/// would be presumed dead and duplicated.
fn validate_flag_outlives_probe(config: &Config) -> Result<(), ConfigError> {
    if config.storage.check_flag_ttl <= config.fetcher.get_timeout {
        return Err(ConfigError::Validation(format!(
            "check-flag-ttl ({}s) must exceed get-timeout ({}s)",
            config.storage.check_flag_ttl, config.fetcher.get_timeout
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_bad_redis_scheme() {
        let mut config = Config::default();
        config.storage.redis_url = "http://localhost:6379".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = Config::default();
        config.fetcher.head_timeout = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.fetcher.get_timeout = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.webhook.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_flag_must_outlive_probe() {
        let mut config = Config::default();
        config.storage.check_flag_ttl = 60;
        config.fetcher.get_timeout = 120;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_get_only_domain() {
        let mut config = Config::default();
        config.fetcher.get_only_domains = vec!["not a domain".to_string()];
        assert!(validate(&config).is_err());
    }
}
