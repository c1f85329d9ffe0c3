use thiserror::Error;

/// Policy engine error types
///
/// Only the token parsers and loaders return these. The matching pipeline
/// treats bad rule data as non-matching instead of failing.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Malformed address token: {0}")]
    MalformedAddressToken(String),

    #[error("Malformed port token: {0}")]
    MalformedPortToken(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid flow: {0}")]
    InvalidFlow(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PolicyError>;
