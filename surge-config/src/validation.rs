//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Domain {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a finite, strictly positive rate
pub fn validate_rate(value: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} must be a finite number, got {}", field_name, value),
        });
    }
    validate_positive(value, field_name, domain)
}

/// Validate an HTTP(S) URL
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::Domain {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Domain {
            domain: domain.to_string(),
            message: format!("{} scheme '{}' not supported (only http/https)", field_name, scheme),
        }),
    }
}

/// Validate a complete configuration object
pub fn validate_config(config: &crate::domains::SurgeConfig) -> ConfigResult<()> {
    config.validate_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(1u64, "x", "d").is_ok());
        assert!(validate_positive(0u64, "x", "d").is_err());
        assert!(validate_positive(-1.0f64, "x", "d").is_err());
    }

    #[test]
    fn test_validate_rate_rejects_nan() {
        assert!(validate_rate(f64::NAN, "rate", "load").is_err());
        assert!(validate_rate(f64::INFINITY, "rate", "load").is_err());
        assert!(validate_rate(0.5, "rate", "load").is_ok());
    }

    #[test]
    fn test_validate_url_schemes() {
        assert!(validate_url("http://localhost:3000", "base_url", "target").is_ok());
        assert!(validate_url("https://example.com", "base_url", "target").is_ok());
        assert!(validate_url("ftp://example.com", "base_url", "target").is_err());
        assert!(validate_url("not a url", "base_url", "target").is_err());
        assert!(validate_url("", "base_url", "target").is_err());
    }
}
