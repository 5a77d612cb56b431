//! Sessions: one connection bound to a caller's logic for its whole run.
//!
//! [`session`] acquires exactly one handle, runs the body against a
//! [`Session`], and hands the handle back through exactly one provider call.
//! The [`Session`] value owns the handle; whichever exit path drops it
//! (normal return, error, or cancellation of the enclosing future) performs
//! the release, and taking the handle out of its slot makes a second release
//! impossible.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use mysql_transport::Status;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::handle::{ConnectionHandle, ConnectionProvider};
use crate::request::{ControlStatement, Request, Response};
use crate::state::SessionState;
use crate::transaction::{IsolationLevel, Transaction};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Run `body` on a session bound to one connection from `provider`.
///
/// The body receives `&mut Session` and returns a boxed future:
///
/// ```rust,ignore
/// let count = mysql_session::session(&pool, |s| {
///     Box::pin(async move {
///         s.query("LOCK TABLES accounts WRITE").await?;
///         let n = s
///             .transaction(|tx| {
///                 Box::pin(async move {
///                     tx.query("UPDATE accounts SET balance = balance - 10 WHERE id = 1").await?;
///                     tx.query("UPDATE accounts SET balance = balance + 10 WHERE id = 2").await?;
///                     Ok::<_, Error>(2)
///                 })
///             })
///             .await?;
///         s.query("UNLOCK TABLES").await?;
///         Ok::<_, Error>(n)
///     })
/// })
/// .await?;
/// ```
///
/// Acquisition failures are returned as-is; there is no retry at this layer.
/// Errors from the body are returned unchanged after the connection has been
/// released.
pub async fn session<P, F, T, E>(provider: &P, body: F) -> std::result::Result<T, E>
where
    P: ConnectionProvider,
    F: for<'s> FnOnce(&'s mut Session<'_, P>) -> BoxFuture<'s, std::result::Result<T, E>> + Send,
    T: Send,
    E: From<Error> + Send,
{
    session_with_config(provider, SessionConfig::default(), body).await
}

/// Like [`session`], with explicit [`SessionConfig`].
pub async fn session_with_config<P, F, T, E>(
    provider: &P,
    config: SessionConfig,
    body: F,
) -> std::result::Result<T, E>
where
    P: ConnectionProvider,
    F: for<'s> FnOnce(&'s mut Session<'_, P>) -> BoxFuture<'s, std::result::Result<T, E>> + Send,
    T: Send,
    E: From<Error> + Send,
{
    let handle = provider.acquire().await.map_err(|e| {
        tracing::debug!(error = %e, "connection acquisition failed");
        E::from(Error::Connection(e))
    })?;

    let mut session = Session::new(provider, handle, config);
    tracing::debug!(session_id = session.id, "session started");

    let result = body(&mut session).await;
    session.flush_discard().await;
    session.release();
    result
}

/// A connection bound to a caller for the duration of [`session`].
pub struct Session<'p, P: ConnectionProvider> {
    id: u64,
    provider: &'p P,
    handle: Option<P::Handle>,
    state: SessionState,
    open_transactions: u32,
    config: SessionConfig,
}

impl<'p, P: ConnectionProvider> Session<'p, P> {
    fn new(provider: &'p P, handle: P::Handle, config: SessionConfig) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            provider,
            handle: Some(handle),
            state: SessionState::Active,
            open_transactions: 0,
            config,
        }
    }

    /// Process-unique session id, used in log fields.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Liveness of the bound connection.
    #[must_use]
    pub fn status(&self) -> Status {
        self.handle
            .as_ref()
            .map_or(Status::Closed, ConnectionHandle::status)
    }

    /// Send an ordinary query on the bound connection.
    pub async fn query(&mut self, sql: impl Into<String>) -> Result<Response> {
        self.send(Request::Query(sql.into()), 0).await
    }

    /// Run `body` inside `START TRANSACTION` / `COMMIT`, rolling back on error.
    ///
    /// The transaction borrows this session's connection; no second
    /// connection is acquired. If the body fails, `ROLLBACK` is sent and the
    /// body's error is returned unchanged.
    pub async fn transaction<F, T, E>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, 'p, P>) -> BoxFuture<'t, std::result::Result<T, E>>
            + Send,
        T: Send,
        E: From<Error> + Send,
    {
        self.run_transaction(1, None, body).await
    }

    /// Like [`transaction`](Self::transaction), setting the isolation level
    /// for this transaction first.
    pub async fn transaction_with_isolation<F, T, E>(
        &mut self,
        level: IsolationLevel,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, 'p, P>) -> BoxFuture<'t, std::result::Result<T, E>>
            + Send,
        T: Send,
        E: From<Error> + Send,
    {
        self.run_transaction(1, Some(level), body).await
    }

    /// Poison the connection so the provider evicts it instead of pooling it.
    ///
    /// The poison marker is sent once, after any request already issued on
    /// this session. Inside a transaction it is held back until the
    /// outermost transaction has sent its `ROLLBACK`; no `COMMIT` follows a
    /// discard. Later queries fail with [`Error::Discarded`]. A failure to
    /// deliver the marker is logged; the release still goes through the
    /// poisoned path.
    pub async fn discard(&mut self) {
        if !self.state.is_usable() {
            return;
        }

        self.state = SessionState::Discarding;
        if self.open_transactions > 0 {
            tracing::debug!(
                session_id = self.id,
                open_transactions = self.open_transactions,
                "discard requested inside transaction, poisoning after rollback"
            );
            return;
        }

        self.flush_discard().await;
    }

    /// Send the poison marker held back by a `Discarding` session.
    async fn flush_discard(&mut self) {
        if self.state != SessionState::Discarding {
            return;
        }

        let session_id = self.id;
        self.state = SessionState::Discarded;

        if let Some(handle) = self.handle.as_mut() {
            tracing::debug!(session_id, "discarding session, poisoning connection");
            if let Err(e) = handle.send(Request::Poison).await {
                tracing::warn!(session_id, error = %e, "failed to deliver poison marker");
            }
        }
    }

    pub(crate) async fn send(&mut self, request: Request, depth: u32) -> Result<Response> {
        let session_id = self.id;
        let command_timeout = self.config.command_timeout;
        let handle = match (self.state, self.handle.as_mut()) {
            (SessionState::Active, Some(handle)) => handle,
            (SessionState::Discarding, Some(handle))
                if matches!(request, Request::Control(ControlStatement::Rollback)) =>
            {
                handle
            }
            (SessionState::Discarding | SessionState::Discarded, _) => {
                return Err(Error::Discarded);
            }
            (SessionState::Broken, _) => return Err(Error::Broken),
            _ => return Err(Error::Released),
        };

        tracing::trace!(session_id, depth, statement = %request, "sending request");

        let result = match command_timeout {
            None => handle.send(request).await,
            Some(limit) => match tokio::time::timeout(limit, handle.send(request)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        session_id,
                        depth,
                        timeout = ?limit,
                        "request abandoned after timeout, connection will be evicted"
                    );
                    self.state = SessionState::Broken;
                    return Err(Error::CommandTimeout(limit));
                }
            },
        };

        result.map_err(|e| {
            tracing::debug!(session_id, depth, error = %e, "request failed");
            Error::Protocol(e)
        })
    }

    pub(crate) async fn run_transaction<F, T, E>(
        &mut self,
        depth: u32,
        isolation: Option<IsolationLevel>,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, 'p, P>) -> BoxFuture<'t, std::result::Result<T, E>>
            + Send,
        T: Send,
        E: From<Error> + Send,
    {
        let session_id = self.id;

        if let Some(level) = isolation {
            tracing::debug!(session_id, depth, isolation_level = %level.name(), "setting isolation level");
            self.send(Request::query(level.as_sql()), depth)
                .await
                .map_err(E::from)?;
        }

        tracing::debug!(session_id, depth, "beginning transaction");
        if let Err(e) = self.send(ControlStatement::StartTransaction.into(), depth).await {
            if self.state.is_usable() {
                self.rollback(depth).await;
            }
            return Err(E::from(e));
        }

        self.open_transactions += 1;
        let outcome = {
            let mut tx = Transaction::new(self, depth);
            body(&mut tx).await
        };

        let result = match outcome {
            Ok(value) => {
                tracing::debug!(session_id, depth, "committing transaction");
                self.send(ControlStatement::Commit.into(), depth)
                    .await
                    .map(|_| value)
                    .map_err(E::from)
            }
            Err(e) => {
                self.rollback(depth).await;
                Err(e)
            }
        };

        self.open_transactions -= 1;
        if self.open_transactions == 0 {
            self.flush_discard().await;
        }
        result
    }

    /// Best-effort `ROLLBACK`. Never replaces the error that triggered it.
    async fn rollback(&mut self, depth: u32) {
        let session_id = self.id;
        if !self.state.can_roll_back() {
            tracing::debug!(session_id, depth, state = %self.state, "skipping rollback");
            return;
        }

        tracing::debug!(session_id, depth, "rolling back transaction");
        if let Err(e) = self.send(ControlStatement::Rollback.into(), depth).await {
            tracing::warn!(session_id, depth, error = %e, "rollback failed");
        }
    }

    /// Hand the connection back to the provider. Only the first call acts.
    fn release(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let poisoned = self.state.is_poisoned() || !handle.status().is_open();
        self.state = SessionState::Released;

        if poisoned {
            tracing::debug!(session_id = self.id, status = %handle.status(), "releasing poisoned connection");
            self.provider.release_poisoned(handle);
        } else {
            tracing::debug!(session_id = self.id, "releasing connection");
            self.provider.release(handle);
        }
    }
}

impl<P: ConnectionProvider> Drop for Session<'_, P> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            tracing::warn!(
                session_id = self.id,
                "session dropped before completion, connection will be evicted"
            );
            // The in-flight request may never have been answered.
            if self.state.is_usable() {
                self.state = SessionState::Broken;
            }
            self.release();
        }
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for Session<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::{ConnectionError, ProtocolError};
    use crate::request::OkPacket;

    #[derive(Default)]
    struct Log {
        requests: Vec<String>,
        acquired: usize,
        released: usize,
        poisoned: usize,
    }

    struct TestHandle {
        log: Arc<Mutex<Log>>,
    }

    #[async_trait::async_trait]
    impl ConnectionHandle for TestHandle {
        async fn send(&mut self, request: Request) -> std::result::Result<Response, ProtocolError> {
            self.log.lock().requests.push(request.to_string());
            match request.sql() {
                Some(sql) if sql.starts_with("BAD") => {
                    Err(ProtocolError::server(1064, "42000", "syntax error"))
                }
                Some(_) => Ok(Response::Ok(OkPacket::default())),
                None => Ok(Response::Poisoned),
            }
        }
    }

    #[derive(Default)]
    struct TestProvider {
        log: Arc<Mutex<Log>>,
        refuse: bool,
    }

    #[async_trait::async_trait]
    impl ConnectionProvider for TestProvider {
        type Handle = TestHandle;

        async fn acquire(&self) -> std::result::Result<TestHandle, ConnectionError> {
            if self.refuse {
                return Err(ConnectionError::Unavailable("refused".into()));
            }
            self.log.lock().acquired += 1;
            Ok(TestHandle {
                log: Arc::clone(&self.log),
            })
        }

        fn release(&self, _handle: TestHandle) {
            self.log.lock().released += 1;
        }

        fn release_poisoned(&self, _handle: TestHandle) {
            self.log.lock().poisoned += 1;
        }
    }

    #[tokio::test]
    async fn test_plain_queries_release_once() {
        let provider = TestProvider::default();

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.query("SELECT 1").await?;
                s.query("SELECT 2").await?;
                Ok::<_, Error>(s.state())
            })
        })
        .await;

        assert_eq!(result.unwrap(), SessionState::Active);
        let log = provider.log.lock();
        assert_eq!(log.requests, ["SELECT 1", "SELECT 2"]);
        assert_eq!((log.acquired, log.released, log.poisoned), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_acquire_failure_releases_nothing() {
        let provider = TestProvider {
            refuse: true,
            ..TestProvider::default()
        };

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.query("SELECT 1").await?;
                Ok::<_, Error>(())
            })
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::Connection(ConnectionError::Unavailable(_)))
        ));
        let log = provider.log.lock();
        assert!(log.requests.is_empty());
        assert_eq!((log.released, log.poisoned), (0, 0));
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let provider = TestProvider::default();

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.transaction(|tx| {
                    Box::pin(async move {
                        tx.query("INSERT INTO t VALUES (1)").await?;
                        tx.query("BAD STATEMENT").await?;
                        Ok::<_, Error>(())
                    })
                })
                .await
            })
        })
        .await;

        assert_eq!(result.unwrap_err().server_code(), Some(1064));
        let log = provider.log.lock();
        assert_eq!(
            log.requests,
            [
                "START TRANSACTION",
                "INSERT INTO t VALUES (1)",
                "BAD STATEMENT",
                "ROLLBACK"
            ]
        );
        assert_eq!((log.released, log.poisoned), (1, 0));
    }

    #[tokio::test]
    async fn test_query_after_discard_fails_fast() {
        let provider = TestProvider::default();

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.discard().await;
                s.discard().await;
                s.query("SELECT 1").await.map(|_| ())
            })
        })
        .await;

        assert!(matches!(result, Err(Error::Discarded)));
        let log = provider.log.lock();
        assert_eq!(log.requests, ["<poison>"]);
        assert_eq!((log.released, log.poisoned), (0, 1));
    }

    #[tokio::test]
    async fn test_discard_in_failing_transaction_poisons_after_rollback() {
        let provider = TestProvider::default();

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.transaction(|tx| {
                    Box::pin(async move {
                        match tx.query("BAD INSERT").await {
                            Ok(_) => Ok(()),
                            Err(e) => {
                                tx.discard().await;
                                assert!(matches!(
                                    tx.query("SELECT 1").await,
                                    Err(Error::Discarded)
                                ));
                                Err(e)
                            }
                        }
                    })
                })
                .await
            })
        })
        .await;

        assert_eq!(result.unwrap_err().server_code(), Some(1064));
        let log = provider.log.lock();
        assert_eq!(
            log.requests,
            ["START TRANSACTION", "BAD INSERT", "ROLLBACK", "<poison>"]
        );
        assert_eq!((log.released, log.poisoned), (0, 1));
    }

    #[tokio::test]
    async fn test_nested_transaction_after_discard_sends_nothing() {
        let provider = TestProvider::default();

        let result = session(&provider, |s| {
            Box::pin(async move {
                s.transaction(|tx| {
                    Box::pin(async move {
                        tx.discard().await;
                        tx.transaction(|inner| {
                            Box::pin(async move {
                                inner.query("SELECT 1").await?;
                                Ok::<_, Error>(())
                            })
                        })
                        .await
                    })
                })
                .await
            })
        })
        .await;

        assert!(matches!(result, Err(Error::Discarded)));
        let log = provider.log.lock();
        assert_eq!(log.requests, ["START TRANSACTION", "ROLLBACK", "<poison>"]);
        assert_eq!((log.released, log.poisoned), (0, 1));
    }

    #[tokio::test]
    async fn test_isolation_level_precedes_start() {
        let provider = TestProvider::default();

        session(&provider, |s| {
            Box::pin(async move {
                s.transaction_with_isolation(IsolationLevel::Serializable, |tx| {
                    Box::pin(async move {
                        tx.query("SELECT 1").await?;
                        Ok::<_, Error>(())
                    })
                })
                .await
            })
        })
        .await
        .unwrap();

        let log = provider.log.lock();
        assert_eq!(
            log.requests,
            [
                "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
                "START TRANSACTION",
                "SELECT 1",
                "COMMIT"
            ]
        );
    }
}
