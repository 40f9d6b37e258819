//! Adapter error types.

use thiserror::Error;

/// Error type for all adapter operations.
///
/// Every remote failure maps one-to-one onto a variant here: the adapter
/// performs no retries and no automatic reconnection. Short reads are not
/// errors — they signal proximity to end-of-file.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Malformed remote address (missing host, missing path, bad URL).
    #[error("invalid address: {0}")]
    AddressParse(String),

    /// The remote server rejected the login. Single attempt, no retry.
    #[error("authentication failed for {user}@{host}")]
    Authentication { user: String, host: String },

    /// Transport-level failure reported by the remote client.
    #[error("connection error: {0}")]
    Connection(String),

    /// Remote path absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a regular file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Operation the adapter deliberately does not emulate
    /// (owner/group-name metadata, stream-cast, stream options).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Seek target would land before the start of the stream.
    /// The cursor is left unchanged.
    #[error("seek out of range: {0}")]
    InvalidSeek(i64),

    /// The remote client reported failure for an operation.
    #[error("remote operation failed: {0}")]
    Remote(String),
}

impl StreamError {
    /// Create an AddressParse error.
    pub fn address(msg: impl Into<String>) -> Self {
        Self::AddressParse(msg.into())
    }

    /// Create an Authentication error.
    pub fn authentication(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            host: host.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create a Remote error.
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }
}

impl From<russh::Error> for StreamError {
    fn from(e: russh::Error) -> Self {
        StreamError::Connection(e.to_string())
    }
}

/// Result type for adapter operations.
pub type StreamResult<T> = Result<T, StreamError>;
