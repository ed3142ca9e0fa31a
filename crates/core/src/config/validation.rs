use crate::errors::{RelayError, Result};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> Result<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(RelayError::config_error(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> Result<()> {
        if timeout_seconds == 0 {
            return Err(RelayError::config_error(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 3600 {
            return Err(RelayError::config_error(format!(
                "{field_name} must be less than or equal to 3600"
            )));
        }
        Ok(())
    }

    /// Validate that a count is within `1..=max`
    pub fn validate_count(count: usize, field_name: &str, max: usize) -> Result<()> {
        if count == 0 {
            return Err(RelayError::config_error(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > max {
            return Err(RelayError::config_error(format!(
                "{field_name} must be less than or equal to {max}"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a scheme
    pub fn validate_url(url: &str, field_name: &str) -> Result<()> {
        Self::validate_not_empty(url, field_name)?;
        if !url.contains(':') {
            return Err(RelayError::config_error(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }
        Ok(())
    }
}
