//! Error types for the proxy configuration surface.

/// Result type alias for fallible proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring a proxy.
///
/// Coordinate-level misuse never produces an error; invalid or stale indexes
/// resolve to [`ModelIndex::invalid()`](crate::model::ModelIndex::invalid).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The filter pattern does not compile.
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration could not be parsed.
    #[error("Invalid proxy configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be written.
    #[error("Failed to serialize proxy configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl Error {
    /// Create a pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }
}
