//! Error types for the application layer.

use thiserror::Error;

/// Application-level error type.
///
/// GPU failures live in `e3d_rhi::RhiError`; this type covers everything
/// around them: windowing, configuration and file access.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
