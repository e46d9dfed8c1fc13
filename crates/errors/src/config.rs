//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("cannot parse config: {message}")]
    ParseError { message: String },

    /// A value that parses but cannot be used, including environment overrides
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Check the --config path, or omit it to use ~/.config/devnet/config.toml.")
            }
            Self::ParseError { .. } => Some("Fix the TOML syntax in the configuration file."),
            Self::InvalidValue { field, .. } if field.starts_with("DEVNET_") => {
                Some("Unset or correct the environment variable named in the error.")
            }
            Self::InvalidValue { .. } => Some("Fix the configuration value and retry the command."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::InvalidValue { .. } => "config.invalid_value",
        };
        Some(code)
    }
}
