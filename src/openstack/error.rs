//! Error types for the OpenStack compute client.

use thiserror::Error;

use crate::config::ConfigLoadError;

/// Errors raised by [`super::OpenStackClient`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OpenStackError {
    /// Raised when the client configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the request never produced an HTTP response.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Message from the HTTP client.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("compute API returned {status} for {url}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
        /// Response body, if any.
        message: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder error message.
        message: String,
    },
}

impl From<ConfigLoadError> for OpenStackError {
    fn from(value: ConfigLoadError) -> Self {
        Self::Config(value.to_string())
    }
}
