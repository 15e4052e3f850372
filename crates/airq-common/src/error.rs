//! Error types shared across AirQ crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while interpreting shared vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Unsupported pollutant parameter: {0}")]
    UnknownParameter(String),

    #[error("Unsupported measurement unit: {0}")]
    UnknownUnit(String),

    #[error("Object key is not valid percent-encoded UTF-8: {0}")]
    KeyDecode(String),
}
