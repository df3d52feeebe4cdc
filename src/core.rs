use std::{io, path::Path};

use thiserror::Error;

/// Error types for the indicator application.
///
/// Covers configuration loading and validation. Engine failures are
/// reported through [`crate::services::mpris::MediaError`].
#[derive(Error, Debug)]
pub enum IndicatorError {
    /// Configuration validation error
    #[error("invalid config field '{field}': {reason}")]
    InvalidConfigField {
        /// The field that is invalid
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed TOML
    #[error("{0}")]
    TomlParse(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, IndicatorError>;

impl IndicatorError {
    /// Wrap a TOML parse failure, naming the file when there is one.
    pub fn toml_parse(error: impl std::fmt::Display, path: Option<&Path>) -> Self {
        match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                Self::TomlParse(format!("Failed to parse TOML at {clean_path:?}: {error}"))
            }
            None => Self::TomlParse(format!("Failed to parse TOML: {error}")),
        }
    }

    /// Reject a configuration value.
    pub fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfigField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
