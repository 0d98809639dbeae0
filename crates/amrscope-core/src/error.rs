//! Error types for amrscope operations.
//!
//! Statistical degeneracies are not errors: they resolve to neutral test
//! outcomes. Only malformed inputs and configuration surface here.

use thiserror::Error;

/// Result type for amrscope operations.
pub type Result<T> = std::result::Result<T, AmrError>;

/// Errors that can occur while building matrices or running analyses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmrError {
    /// Matrix construction received inconsistent dimensions or duplicate keys.
    #[error("Shape error: {0}")]
    Shape(String),

    /// A feature name was requested that the matrix does not contain.
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Unrecognized class aggregation rule.
    #[error("Invalid class rule {rule:?} (expected one of: {valid})")]
    InvalidRule { rule: String, valid: String },

    /// Configuration value rejected before an analysis could start.
    #[error("Invalid value for {field}: {value} ({reason})")]
    Config {
        field: String,
        value: String,
        reason: String,
    },

    /// I/O errors (wrapped).
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for AmrError {
    fn from(e: std::io::Error) -> Self {
        AmrError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AmrError {
    fn from(e: serde_json::Error) -> Self {
        AmrError::Serialization(e.to_string())
    }
}

// Convenience constructors
impl AmrError {
    pub fn shape(msg: impl Into<String>) -> Self {
        AmrError::Shape(msg.into())
    }

    pub fn unknown_feature(name: impl Into<String>) -> Self {
        AmrError::UnknownFeature(name.into())
    }

    pub fn invalid_config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AmrError::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_rule_names_the_offender() {
        let e = AmrError::InvalidRule {
            rule: "most".into(),
            valid: "any, all, majority".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("\"most\""), "{}", msg);
        assert!(msg.contains("majority"));
    }

    #[test]
    fn config_error_display() {
        let e = AmrError::invalid_config("alpha", "1.5", "must be in (0, 1)");
        assert_eq!(e.to_string(), "Invalid value for alpha: 1.5 (must be in (0, 1))");
    }
}
