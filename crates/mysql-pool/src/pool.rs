//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use mysql_session::{
    ConnectionError, ConnectionHandle, ConnectionProvider, ProtocolError, Request, Response,
};
use mysql_transport::Status;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lifecycle::{ConnectionFactory, ConnectionMetadata};

/// A connection pool for MySQL sessions.
///
/// Capacity is a semaphore with `max_connections` slots. A checked-out
/// connection holds one slot; idle connections hold none, and a slot is
/// always freed after its connection has been queued as idle, so idle plus
/// checked-out connections never exceed `max_connections`.
///
/// Cloning is cheap and yields a handle to the same pool.
pub struct Pool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

struct PoolInner<F: ConnectionFactory> {
    config: PoolConfig,
    factory: F,
    slots: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection<F::Connection>>>,
    closed: AtomicBool,
    next_id: AtomicU64,
}

struct IdleConnection<C> {
    conn: C,
    meta: ConnectionMetadata,
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create a pool that opens connections through `factory`.
    ///
    /// No connection is opened until the first checkout.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let slots = usize::try_from(config.max_connections)
            .map_err(|_| PoolError::Configuration("max_connections is too large".into()))?;

        tracing::debug!(
            max_connections = config.max_connections,
            "connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                slots: Arc::new(Semaphore::new(slots)),
                idle: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Get a connection from the pool.
    ///
    /// Waits up to `connection_timeout` for a free slot, then reuses the most
    /// recently returned idle connection that is still fit for use, or opens
    /// a new one if there is none.
    pub async fn get(&self) -> Result<PooledConnection<F::Connection>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        tracing::trace!("acquiring connection from pool");

        let timeout = self.inner.config.connection_timeout;
        let permit = match tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::PoolClosed),
            Err(_) => {
                tracing::debug!(?timeout, "timed out waiting for a pool slot");
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
        };

        while let Some(mut idle) = self.pop_idle() {
            if let Some(reason) = self.stale_reason(&idle) {
                tracing::debug!(connection_id = idle.meta.id, reason, "discarding idle connection");
                continue;
            }

            if self.inner.config.test_on_checkout && !self.health_check(&mut idle).await {
                continue;
            }

            idle.meta.mark_checkout();
            tracing::trace!(connection_id = idle.meta.id, "reusing idle connection");
            return Ok(PooledConnection::new(idle.conn, idle.meta, permit));
        }

        let conn = match tokio::time::timeout(timeout, self.inner.factory.connect()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(?timeout, "timed out opening a new connection");
                return Err(PoolError::AcquisitionTimeout(timeout));
            }
        };

        let mut meta = ConnectionMetadata::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        meta.mark_checkout();
        tracing::debug!(connection_id = meta.id, "opened new connection");

        Ok(PooledConnection::new(conn, meta, permit))
    }

    /// Return a connection to the idle queue if it is still reusable,
    /// otherwise close it.
    pub fn put(&self, conn: PooledConnection<F::Connection>) {
        let PooledConnection {
            conn,
            mut meta,
            poisoned,
            permit,
        } = conn;

        let reason = if poisoned {
            Some("poisoned")
        } else if !conn.status().is_open() {
            Some("transport closed")
        } else if meta.is_expired(self.inner.config.max_lifetime) {
            Some("max lifetime exceeded")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::debug!(connection_id = meta.id, reason, "evicting connection");
            }
            None => {
                meta.mark_checkin();
                let mut idle = self.inner.idle.lock();
                if self.is_closed() {
                    tracing::debug!(connection_id = meta.id, "pool closed, evicting connection");
                } else {
                    tracing::trace!(connection_id = meta.id, "returning connection to pool");
                    idle.push_back(IdleConnection { conn, meta });
                }
            }
        }

        drop(permit);
    }

    /// Close a connection without returning it to the idle queue.
    pub fn evict(&self, conn: PooledConnection<F::Connection>) {
        tracing::debug!(
            connection_id = conn.meta.id,
            poisoned = conn.poisoned,
            "evicting connection"
        );
        drop(conn);
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max = self.inner.config.max_connections;
        let available = u32::try_from(self.inner.idle.lock().len()).unwrap_or(max);
        let free = u32::try_from(self.inner.slots.available_permits()).unwrap_or(max);
        let in_use = max.saturating_sub(free);

        PoolStatus {
            available,
            in_use,
            total: available + in_use,
            max,
        }
    }

    /// Close the pool, dropping all idle connections.
    ///
    /// Waiting and later checkouts fail with [`PoolError::PoolClosed`].
    /// Connections still checked out are closed when they come back.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.slots.close();

        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        tracing::info!(idle_closed = drained.len(), "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the connection factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    fn pop_idle(&self) -> Option<IdleConnection<F::Connection>> {
        self.inner.idle.lock().pop_back()
    }

    fn stale_reason(&self, idle: &IdleConnection<F::Connection>) -> Option<&'static str> {
        let config = &self.inner.config;
        if !idle.conn.status().is_open() {
            Some("transport closed")
        } else if idle.meta.is_expired(config.max_lifetime) {
            Some("max lifetime exceeded")
        } else if idle.meta.is_idle_expired(config.idle_timeout) {
            Some("idle timeout exceeded")
        } else {
            None
        }
    }

    async fn health_check(&self, idle: &mut IdleConnection<F::Connection>) -> bool {
        let config = &self.inner.config;
        let query = Request::query(&*config.health_check_query);

        match tokio::time::timeout(config.connection_timeout, idle.conn.send(query)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(connection_id = idle.meta.id, error = %e, "health check failed");
                false
            }
            Err(_) => {
                tracing::debug!(connection_id = idle.meta.id, "health check timed out");
                false
            }
        }
    }
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<F: ConnectionFactory> ConnectionProvider for Pool<F> {
    type Handle = PooledConnection<F::Connection>;

    async fn acquire(&self) -> Result<Self::Handle, ConnectionError> {
        self.get().await.map_err(ConnectionError::from)
    }

    fn release(&self, handle: Self::Handle) {
        self.put(handle);
    }

    fn release_poisoned(&self, handle: Self::Handle) {
        self.evict(handle);
    }

    async fn close(&self) {
        Pool::close(self).await;
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently in use.
    pub in_use: u32,
    /// Total number of connections.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

/// A connection checked out of the pool.
///
/// Hand it back with [`Pool::put`] or [`Pool::evict`], or through the
/// [`ConnectionProvider`] methods. Dropping it instead closes the connection
/// and frees its slot.
pub struct PooledConnection<C> {
    conn: C,
    meta: ConnectionMetadata,
    poisoned: bool,
    permit: OwnedSemaphorePermit,
}

impl<C> PooledConnection<C> {
    fn new(conn: C, meta: ConnectionMetadata, permit: OwnedSemaphorePermit) -> Self {
        Self {
            conn,
            meta,
            poisoned: false,
            permit,
        }
    }

    /// Pool-assigned connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// Lifecycle metadata for this connection.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.meta
    }

    /// Check if the poison marker has been received.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}

#[async_trait::async_trait]
impl<C: ConnectionHandle> ConnectionHandle for PooledConnection<C> {
    async fn send(&mut self, request: Request) -> Result<Response, ProtocolError> {
        // The marker is pool bookkeeping; the server never sees it.
        if request.is_poison() {
            if !self.poisoned {
                tracing::debug!(connection_id = self.meta.id, "connection poisoned");
            }
            self.poisoned = true;
            return Ok(Response::Poisoned);
        }

        self.conn.send(request).await
    }

    fn status(&self) -> Status {
        if self.poisoned {
            Status::Closed
        } else {
            self.conn.status()
        }
    }
}

impl<C> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("meta", &self.meta)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}
