//! Error types for peercache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while serving, loading or routing cache entries
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Empty cache key
    #[error("key is empty")]
    EmptyKey,

    /// Request path does not match `<base-path>/<group>/<key>`
    #[error("bad request: {0}")]
    BadRequest(String),

    // =========================================================================
    // Not-Found Errors
    // =========================================================================
    /// No group registered under this name
    #[error("no such group: {0}")]
    GroupNotFound(String),

    /// The user loader failed; its message is surfaced verbatim
    #[error(transparent)]
    Loader(anyhow::Error),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Peer unreachable, connection reset or request timed out
    #[error("peer request failed: {0}")]
    PeerConnection(#[source] reqwest::Error),

    /// Peer answered with a non-200 status
    #[error("server returned: {status}")]
    PeerStatus { status: reqwest::StatusCode },

    /// Peer response body could not be read
    #[error("read response body: {0}")]
    PeerBody(#[source] reqwest::Error),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration detected at start-up
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// True for peer failures that the group recovers from by loading locally
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::PeerConnection(_) | Error::PeerStatus { .. } | Error::PeerBody(_)
        )
    }

    /// True for errors the peer server reports as 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::GroupNotFound(_) | Error::Loader(_))
    }
}
