//! CLI error handling

use std::fmt;

use devnet_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Operations error
    Ops(devnet_errors::Error),
    /// System setup error
    Setup(String),
    /// I/O error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Ops(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Setup(msg) => write!(f, "System setup error: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl CliError {
    /// Machine-readable form printed in JSON mode
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CliError::Ops(e) => serde_json::json!({
                "error": true,
                "code": e.user_code(),
                "message": e.user_message(),
                "hint": e.user_hint(),
                "retryable": e.is_retryable(),
            }),
            other => serde_json::json!({
                "error": true,
                "code": null,
                "message": other.to_string(),
                "hint": null,
                "retryable": false,
            }),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Ops(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::Setup(_) => None,
        }
    }
}

impl From<devnet_errors::Error> for CliError {
    fn from(e: devnet_errors::Error) -> Self {
        CliError::Ops(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devnet_errors::UpgradeError;

    #[test]
    fn test_json_carries_code_and_hint() {
        let err = CliError::from(devnet_errors::Error::Cancelled);
        let value = err.to_json();
        assert_eq!(value["code"], "error.cancelled");
        assert!(value["hint"].as_str().unwrap().contains("devnet status"));

        let err = CliError::from(devnet_errors::Error::from(UpgradeError::MissingUpgradeName));
        assert!(err.to_string().contains("Code:"));
    }
}
