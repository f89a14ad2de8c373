// src/error.rs

//! Unified error handling for the itinerary renderer.

use std::fmt;

use thiserror::Error;

/// Result type alias for tourmap operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regular expression failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Unknown IANA timezone name
    #[error("Unknown timezone '{0}'")]
    Timezone(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Counter storage backend failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Tile request failed for a specific URL
    #[error("Tile error for {url}: {message}")]
    Tile { url: String, message: String },

    /// Map surface failure (initialization, invalid view, ...)
    #[error("Map error: {0}")]
    Map(String),

    /// Host page could not be parsed or injected
    #[error("Template error: {0}")]
    Template(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a tile error for the given URL.
    pub fn tile(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Tile {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a map error.
    pub fn map(message: impl Into<String>) -> Self {
        Self::Map(message.into())
    }

    /// Create a host page template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_error_mentions_url() {
        let err = AppError::tile("tiles/13/6416/3835.png", "HTTP 404");
        assert_eq!(
            err.to_string(),
            "Tile error for tiles/13/6416/3835.png: HTTP 404"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
    }
}
