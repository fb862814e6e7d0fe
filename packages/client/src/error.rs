//! Error types for the live client.

use thiserror::Error;

/// Client-specific errors
///
/// Network failures reach the caller as connection state transitions; these
/// values are reported on the output channel for logging and display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport could not be opened or failed while open
    #[error("Connection error: {0}")]
    Connection(String),

    /// REST request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Inbound frame was not a valid envelope; the frame is dropped
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Upgrade refused by the server (404 / 410 / 503)
    #[error("Upgrade rejected with status {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
