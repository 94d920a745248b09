//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on either probe count per pass.
pub const MAX_PROBES_PER_PASS: usize = 10_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a fully-merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_audit(config)?;
    validate_cache(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_audit(config: &Config) -> ConfigResult<()> {
    let a = &config.audit;

    if a.root_freshness_secs == 0 {
        return Err(invalid(
            "audit.root_freshness_secs",
            "must be greater than 0",
        ));
    }
    if a.probe_concurrency == 0 {
        return Err(invalid("audit.probe_concurrency", "must be greater than 0"));
    }
    for (field, value) in [
        ("audit.num_pre_probes", a.num_pre_probes),
        ("audit.num_post_probes", a.num_post_probes),
    ] {
        if value > MAX_PROBES_PER_PASS {
            return Err(invalid(
                field,
                format!("{value} exceeds the limit of {MAX_PROBES_PER_PASS}"),
            ));
        }
    }
    Ok(())
}

fn validate_cache(config: &Config) -> ConfigResult<()> {
    if config.cache.capacity == 0 {
        return Err(invalid("cache.capacity", "must be greater than 0"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !LOG_LEVELS.contains(&l.level.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: {}",
                l.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }
    if !LOG_FORMATS.contains(&l.format.to_lowercase().as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }
    Ok(())
}
