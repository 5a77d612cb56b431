//! Transport and TLS error types.

use thiserror::Error;

/// Errors that can occur while setting up TLS.
#[derive(Debug, Error)]
pub enum TlsError {
    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    /// Hostname could not be used for SNI or certificate validation.
    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    /// Invalid certificate format.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Rustls error.
    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Errors that can occur on a connection transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error on the underlying channel.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport recorded a fatal failure earlier and can no longer be used.
    #[error("transport failed: {reason}")]
    Failed {
        /// Description of the first failure recorded on this transport.
        reason: String,
    },

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// The transport is already TLS-encrypted.
    #[error("transport is already TLS-encrypted")]
    AlreadyEncrypted,

    /// Peer certificates could not be read from the channel.
    #[error("peer identity unavailable: {0}")]
    PeerIdentity(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
