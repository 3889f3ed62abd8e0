//! Error types for the Bloom filter client

use thiserror::Error;

use crate::protocol::error_codes;

/// Errors returned by [`FilterClient`](crate::FilterClient) operations
///
/// Every operation yields exactly one of these or a fully populated result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote outcome is unknown; the server may have applied the call.
    #[error("Deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("Server rejected request (code {code}): {message}")]
    Application { code: u32, message: String },

    #[error("Client closed")]
    Closed,

    #[error("Call cancelled by caller")]
    Cancelled,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    pub fn is_filter_not_found(&self) -> bool {
        matches!(
            self,
            Self::Application { code, .. } if *code == error_codes::FILTER_NOT_FOUND
        )
    }

    /// Whether the server may have applied the operation despite the error
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. } | Self::Cancelled)
    }
}

/// Errors from the transport port
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transport closed")]
    Closed,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Remote error {code}: {message}")]
    Remote { code: u32, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(reason) => Self::Connection(reason),
            TransportError::Closed => Self::Closed,
            TransportError::Codec(e) => Self::Protocol(e.to_string()),
            TransportError::Remote { code, message } => Self::Application { code, message },
            TransportError::UnexpectedResponse(what) => Self::Protocol(what),
        }
    }
}

/// Frame encoding and decoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}
