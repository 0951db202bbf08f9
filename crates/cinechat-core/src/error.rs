use thiserror::Error;

/// Error type for configuration and shared value parsing.
///
/// The chat and speech crates keep their own error types; their failures are
/// logged where they happen rather than propagated to the binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CinechatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CinechatError {
    fn from(err: toml::de::Error) -> Self {
        CinechatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CinechatError {
    fn from(err: toml::ser::Error) -> Self {
        CinechatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CinechatError {
    fn from(err: serde_json::Error) -> Self {
        CinechatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Cinechat operations.
pub type Result<T> = std::result::Result<T, CinechatError>;
