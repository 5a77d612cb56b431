//! Pool error types.

use mysql_session::ConnectionError;
use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to acquire a connection within the timeout.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(std::time::Duration),

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Connection creation failed.
    #[error("failed to create connection: {0}")]
    ConnectionCreation(String),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl From<PoolError> for ConnectionError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AcquisitionTimeout(waited) => Self::Timeout(waited),
            PoolError::PoolClosed => Self::Closed,
            other => Self::Unavailable(other.to_string()),
        }
    }
}
