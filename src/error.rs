//! Crate-level error type

use crate::registry::StreamError;

/// Top-level error for server setup and lifecycle operations
#[derive(Debug)]
pub enum Error {
    /// Socket or filesystem failure
    Io(std::io::Error),
    /// Stream resolution/attachment failure
    Stream(StreamError),
    /// Invalid configuration or metadata file
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Stream(e) => write!(f, "{}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Stream(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(e)
    }
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
