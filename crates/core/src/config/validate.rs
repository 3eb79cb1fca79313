use super::{types::Config, ConfigError};

/// Validate configuration.
///
/// Credential files are not touched here; they are read when the client is
/// built and reported as credential errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.ticket.skew_minutes == 0 {
        return Err(ConfigError::ValidationError(
            "ticket.skew_minutes must be greater than 0".to_string(),
        ));
    }

    if config.lookup.max_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "lookup.max_batch_size must be greater than 0".to_string(),
        ));
    }

    if config.lookup.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "lookup.max_concurrency must be greater than 0".to_string(),
        ));
    }

    if config.lookup.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "lookup.timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
