//! Core error types.

use thiserror::Error;

/// Errors that can occur while resolving, linting or fixing a document.
///
/// None of these are allowed to stop the scheduler; callers log them and
/// carry on with fewer diagnostics or fixes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error (unreadable or unparseable config/extends file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error from one of the config parsers.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Custom rule module could not be resolved or loaded.
    #[error("Custom rule error: {0}")]
    CustomRule(String),

    /// Rule-evaluation engine failure.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Ignore pattern or ignore file error.
    #[error("Ignore error: {0}")]
    Ignore(String),

    /// The file layer has nothing at the requested path.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The file layer is not available for this document.
    #[error("No file system available")]
    Unavailable,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a custom rule error.
    pub fn custom_rule(message: impl Into<String>) -> Self {
        Self::CustomRule(message.into())
    }

    /// Creates an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Creates an ignore error.
    pub fn ignore(message: impl Into<String>) -> Self {
        Self::Ignore(message.into())
    }

    /// Creates a not found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Returns true when the error only says the file does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        assert!(CoreError::not_found("a.json").is_not_found());
        assert!(CoreError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).is_not_found());
        assert!(!CoreError::config("bad").is_not_found());
        assert!(!CoreError::Unavailable.is_not_found());
    }

    #[test]
    fn display_includes_category() {
        let err = CoreError::engine("rule MD001 panicked");
        assert_eq!(err.to_string(), "Engine error: rule MD001 panicked");
    }
}
