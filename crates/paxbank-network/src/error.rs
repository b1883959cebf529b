//! Network error types.

use thiserror::Error;

/// Errors that can occur in the transport layer.
///
/// The proposer treats every send error as a missing vote; none of these
/// abort a consensus round on their own.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// IO error during connect, read or write
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Message encoding/decoding error
    #[error("codec error: {0}")]
    Codec(String),

    /// Peer id not present in the peer table
    #[error("unknown peer: {0}")]
    UnknownPeer(u64),

    /// No response arrived within the reply timeout
    #[error("timed out waiting for peer {0}")]
    Timeout(u64),

    /// Peer closed the connection without responding
    #[error("peer {0} closed the connection without a response")]
    ConnectionClosed(u64),
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Codec(err.to_string())
    }
}

impl From<tokio_util::codec::LinesCodecError> for NetworkError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        match err {
            tokio_util::codec::LinesCodecError::Io(io) => NetworkError::Io(io),
            other => NetworkError::Codec(other.to_string()),
        }
    }
}

/// Result type for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
