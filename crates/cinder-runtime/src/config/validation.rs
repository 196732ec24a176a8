//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CinderConfig, LogOutput, LoggingConfig, ServicesConfig, TimeoutsConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CinderConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_services_config(&config.services)?;
    validate_timeouts_config(&config.timeouts)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File
        && logging
            .file_path
            .as_ref()
            .is_none_or(|p| p.file_name().is_none())
    {
        return Err(ConfigError::validation(
            "logging.file_path must name a file when output is 'file'",
        ));
    }

    for target in logging.filters.keys() {
        if target.trim().is_empty() || target.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
    }

    Ok(())
}

fn validate_services_config(services: &ServicesConfig) -> ConfigResult<()> {
    if let Some(profile) = &services.profile
        && profile.trim().is_empty()
    {
        return Err(ConfigError::validation("services.profile cannot be empty"));
    }
    Ok(())
}

fn validate_timeouts_config(timeouts: &TimeoutsConfig) -> ConfigResult<()> {
    if timeouts.default_timeout_ms == 0 {
        return Err(ConfigError::validation(
            "timeouts.default_timeout_ms must be greater than 0",
        ));
    }

    if timeouts.max_timeout_ms < timeouts.default_timeout_ms {
        return Err(ConfigError::validation(
            "timeouts.max_timeout_ms must be greater than or equal to default_timeout_ms",
        ));
    }

    Ok(())
}
