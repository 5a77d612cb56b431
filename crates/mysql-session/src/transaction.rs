//! Transactions scoped to a session's connection.
//!
//! A [`Transaction`] is a view of its owning [`Session`]: it sends on the
//! same connection and never acquires or releases one. Nesting issues a new
//! `START TRANSACTION` on that connection.

use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::handle::ConnectionProvider;
use crate::request::{Request, Response};
use crate::session::Session;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,

    /// Read committed.
    ///
    /// Each consistent read sees a fresh snapshot.
    ReadCommitted,

    /// Repeatable read (InnoDB default).
    ///
    /// Consistent reads within the transaction see the snapshot established
    /// by the first read.
    #[default]
    RepeatableRead,

    /// Serializable.
    ///
    /// Plain `SELECT`s are converted to `SELECT ... FOR SHARE` when
    /// autocommit is off.
    Serializable,
}

impl IsolationLevel {
    /// Get the SQL statement to set this isolation level for the next
    /// transaction.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }

    /// Get the isolation level name as used by the server.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// An open transaction on a session's connection.
///
/// Obtained only inside the body passed to [`Session::transaction`]; the
/// surrounding call sends `COMMIT` or `ROLLBACK` once the body finishes.
pub struct Transaction<'a, 'p, P: ConnectionProvider> {
    session: &'a mut Session<'p, P>,
    depth: u32,
}

impl<'a, 'p, P: ConnectionProvider> Transaction<'a, 'p, P> {
    pub(crate) fn new(session: &'a mut Session<'p, P>, depth: u32) -> Self {
        Self { session, depth }
    }

    /// Nesting depth, starting at 1 for the outermost transaction.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Id of the owning session.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.session.id()
    }

    /// Send a query inside this transaction.
    pub async fn query(&mut self, sql: impl Into<String>) -> Result<Response> {
        self.session
            .send(Request::Query(sql.into()), self.depth)
            .await
    }

    /// Open a nested transaction on the same connection.
    pub async fn transaction<F, T, E>(&mut self, body: F) -> std::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_, 'p, P>) -> BoxFuture<'t, std::result::Result<T, E>>
            + Send,
        T: Send,
        E: From<Error> + Send,
    {
        self.session
            .run_transaction(self.depth + 1, None, body)
            .await
    }

    /// Poison the owning session's connection.
    ///
    /// See [`Session::discard`]. No `COMMIT` follows; if the body then fails,
    /// `ROLLBACK` is still sent and the poison marker goes out after it.
    pub async fn discard(&mut self) {
        self.session.discard().await;
    }
}

impl<P: ConnectionProvider> std::fmt::Debug for Transaction<'_, '_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("session_id", &self.session.id())
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(
            IsolationLevel::ReadCommitted.as_sql(),
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED"
        );
        assert_eq!(
            IsolationLevel::Serializable.as_sql(),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
        );
    }

    #[test]
    fn test_isolation_level_name() {
        assert_eq!(IsolationLevel::ReadUncommitted.name(), "READ UNCOMMITTED");
        assert_eq!(IsolationLevel::RepeatableRead.name(), "REPEATABLE READ");
    }

    #[test]
    fn test_default_is_repeatable_read() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::RepeatableRead);
    }
}
