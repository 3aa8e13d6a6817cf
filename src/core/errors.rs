//! Custom error types for translation operations

use thiserror::Error;

/// Errors raised while talking to the translation service
#[derive(Error, Debug)]
pub enum ElmError {
    /// Transport failure while sending the request or reading the body
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
    },

    /// Service answered with a non-success status
    #[error("Service error: {status} - {message}")]
    ServiceError {
        status: u16,
        message: String,
    },

    /// A multipart part carried a body that is not valid JSON
    #[error("Malformed ELM in part '{name}': {source}")]
    MalformedPartError {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid response from the service
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        message: String,
    },

    /// No multipart boundary could be read from the response
    #[error("No multipart boundary in content-type: {content_type:?}")]
    BoundaryNotFoundError {
        content_type: Option<String>,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError {
        path: String,
        message: String,
    },

    /// Two sources declared the same library name
    #[error("Duplicate library '{name}' in {path}")]
    DuplicateLibraryError {
        name: String,
        path: String,
    },

    /// A part name that cannot be used as an output file name
    #[error("Unsafe library name: {name:?}")]
    UnsafeNameError {
        name: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ElmError {
    fn from(err: config::ConfigError) -> Self {
        ElmError::ConfigError {
            message: err.to_string(),
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, ElmError>;
