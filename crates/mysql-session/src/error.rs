//! Session error types.

use std::time::Duration;

use mysql_transport::TransportError;
use thiserror::Error;

/// Errors raised when a provider cannot hand out a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No connection could be produced.
    #[error("no connection available: {0}")]
    Unavailable(String),

    /// Waiting for a connection took too long.
    #[error("connection acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// The provider has been shut down.
    #[error("connection provider is closed")]
    Closed,

    /// IO error while establishing a connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a single request on a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Server answered with an ERR packet.
    #[error("server error {code} ({sql_state}): {message}")]
    Server {
        /// MySQL error code, e.g. 1213 for a deadlock.
        code: u16,
        /// Five-character SQLSTATE.
        sql_state: String,
        /// Human-readable message.
        message: String,
    },

    /// Connection closed while the request was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed or unexpected frame.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ProtocolError {
    /// Create a server error.
    pub fn server(code: u16, sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by sessions and transactions.
#[derive(Debug, Error)]
pub enum Error {
    /// The provider could not supply a connection.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A request failed on the wire or at the server.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The session was discarded; its connection is poisoned.
    #[error("session was discarded")]
    Discarded,

    /// A request was abandoned mid-flight; the connection state is unknown.
    #[error("session is broken after an abandoned request")]
    Broken,

    /// The session has already released its connection.
    #[error("session connection already released")]
    Released,

    /// A request did not complete within the configured command timeout.
    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),
}

impl Error {
    /// Check if this error is transient and may succeed on retry.
    ///
    /// Deadlocks (1213) and lock wait timeouts (1205) are retryable in MySQL.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(ConnectionError::Timeout(_) | ConnectionError::Io(_)) => true,
            Self::Protocol(ProtocolError::Server { code, .. }) => matches!(code, 1205 | 1213),
            Self::Protocol(ProtocolError::ConnectionClosed | ProtocolError::Io(_)) => true,
            Self::CommandTimeout(_) => true,
            _ => false,
        }
    }

    /// Get the MySQL error code if this is a server error.
    #[must_use]
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Protocol(ProtocolError::Server { code, .. }) => Some(*code),
            _ => None,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
