//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert!(ConfigError::NotFound("x".into()).user_message().contains("defaults"));
        assert!(ConfigError::ParseError("x".into()).user_message().contains("malformed"));
    }

    #[test]
    fn test_display_keeps_detail() {
        let err = ConfigError::Invalid("api.base_url: Host not allowed".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: api.base_url: Host not allowed"
        );
    }
}
