//! Failure taxonomy for the API boundary.
//!
//! Every gateway call resolves to one of these. Channel connect failure is
//! deliberately not an error here: it only changes the live channel status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad credentials or expired session (401/403). During session
    /// bootstrap this forces a silent logout; on the login form it is
    /// shown inline.
    #[error("{0}")]
    Auth(String),

    /// Any other non-2xx response. The message is the server's own
    /// `message` field when the error body parses, else a generic one.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (offline, DNS, TLS)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Client-side required-field check; never sent to the server
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }
}
