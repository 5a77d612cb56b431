//! Connection lifecycle management.
//!
//! This module defines how the pool creates connections and the bookkeeping
//! it keeps for each one.

use std::time::Duration;

use mysql_session::ConnectionHandle;
use tokio::time::Instant;

use crate::error::PoolError;

/// Creates new connections for the pool.
///
/// Implementations perform the TCP connect, optional TLS upgrade and
/// authentication, and hand back a ready [`ConnectionHandle`]. The pool calls
/// this only when no reusable idle connection exists and a slot is free.
#[async_trait::async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Connection type produced by this factory.
    type Connection: ConnectionHandle + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, PoolError>;
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection within its pool.
    pub id: u64,
    /// When the connection was created.
    pub created_at: Instant,
    /// When the connection was last checked out or returned.
    pub last_used_at: Instant,
    /// Number of times the connection has been checked out.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    /// Create metadata for a new connection.
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_count: 0,
        }
    }

    /// Check if the connection has exceeded its maximum lifetime.
    #[must_use]
    pub fn is_expired(&self, max_lifetime: Duration) -> bool {
        self.created_at.elapsed() > max_lifetime
    }

    /// Check if the connection has been idle too long.
    #[must_use]
    pub fn is_idle_expired(&self, idle_timeout: Duration) -> bool {
        self.last_used_at.elapsed() > idle_timeout
    }

    /// Mark the connection as checked out.
    pub fn mark_checkout(&mut self) {
        self.last_used_at = Instant::now();
        self.checkout_count += 1;
    }

    /// Mark the connection as returned to idle.
    pub fn mark_checkin(&mut self) {
        self.last_used_at = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_metadata_new() {
        let meta = ConnectionMetadata::new(1);
        assert_eq!(meta.id, 1);
        assert_eq!(meta.checkout_count, 0);
    }

    #[test]
    fn test_connection_metadata_checkout() {
        let mut meta = ConnectionMetadata::new(1);
        meta.mark_checkout();
        meta.mark_checkin();
        meta.mark_checkout();

        assert_eq!(meta.checkout_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let mut meta = ConnectionMetadata::new(1);
        assert!(!meta.is_expired(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(45)).await;
        meta.mark_checkin();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(meta.is_expired(Duration::from_secs(60)));
        assert!(!meta.is_idle_expired(Duration::from_secs(60)));
        assert!(meta.is_idle_expired(Duration::from_secs(10)));
    }
}
