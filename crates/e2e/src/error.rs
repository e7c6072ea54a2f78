//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("WebDriver error: {error}: {message}")]
    WebDriver { error: String, message: String },

    #[error("Seeding failed: {0}")]
    Seed(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid locator '{locator}': {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("Unknown alias: @{0}")]
    UnknownAlias(String),

    #[error("Undefined variable: {{{{{0}}}}}")]
    UndefinedVariable(String),

    #[error("Assertion failed: {description} (expected {expected}, actual {actual})")]
    AssertionFailed {
        description: String,
        expected: String,
        actual: String,
    },

    #[error("Element '{locator}' is not actionable: {reason}")]
    NotActionable { locator: String, reason: String },

    #[error("Visual regression: {0}")]
    VisualRegression(String),

    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// How a failed scenario is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Observed state did not match the expectation
    Assertion,
    /// Seeding, browser, network or parsing failed before a verdict
    Infrastructure,
    /// A bounded wait expired
    Timeout,
}

impl E2eError {
    pub fn kind(&self) -> FailureKind {
        match self {
            E2eError::AssertionFailed { .. } => FailureKind::Assertion,
            E2eError::Timeout(_) | E2eError::NotActionable { .. } => FailureKind::Timeout,
            _ => FailureKind::Infrastructure,
        }
    }

    pub(crate) fn assertion(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        E2eError::AssertionFailed {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let mismatch = E2eError::assertion("pathname", "/signin", "/personal");
        assert_eq!(mismatch.kind(), FailureKind::Assertion);
        assert!(mismatch.to_string().contains("expected /signin, actual /personal"));

        assert_eq!(E2eError::Timeout("@signup".into()).kind(), FailureKind::Timeout);
        assert_eq!(E2eError::Seed("connection refused".into()).kind(), FailureKind::Infrastructure);
    }

    #[test]
    fn test_undefined_variable_message() {
        let err = E2eError::UndefinedVariable("user.username".into());
        assert_eq!(err.to_string(), "Undefined variable: {{user.username}}");
    }
}
