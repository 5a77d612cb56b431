//! Scripted in-memory connection handle.
//!
//! ```rust,ignore
//! use mysql_testing::{MockConnection, RequestLog};
//! use mysql_session::ProtocolError;
//!
//! let log = RequestLog::new();
//! let conn = MockConnection::new(1, log.clone())
//!     .with_failure("INSERT INTO t VALUES (1)", || {
//!         ProtocolError::server(1062, "23000", "Duplicate entry '1' for key 'PRIMARY'")
//!     })
//!     .with_hang("SELECT SLEEP(60)");
//! ```

use std::fmt;
use std::sync::Arc;

use mysql_session::{ConnectionHandle, OkPacket, ProtocolError, Request, Response};
use mysql_transport::Status;
use parking_lot::Mutex;

use crate::log::RequestLog;

type ErrorFactory = Arc<dyn Fn() -> ProtocolError + Send + Sync>;

/// How a mock connection reacts to particular statements.
///
/// Statements are matched on their exact SQL text. Anything unmatched is
/// answered with an empty OK packet.
#[derive(Clone, Default)]
pub struct Script {
    responses: Vec<(String, Response)>,
    failures: Vec<(String, ErrorFactory)>,
    hangs: Vec<String>,
    disconnects: Vec<String>,
}

impl Script {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `response`.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: Response) -> Self {
        self.responses.push((sql.into(), response));
        self
    }

    /// Fail every occurrence of `sql` with the error `error` produces.
    #[must_use]
    pub fn with_failure<E>(mut self, sql: impl Into<String>, error: E) -> Self
    where
        E: Fn() -> ProtocolError + Send + Sync + 'static,
    {
        self.failures.push((sql.into(), Arc::new(error)));
        self
    }

    /// Never answer `sql`.
    #[must_use]
    pub fn with_hang(mut self, sql: impl Into<String>) -> Self {
        self.hangs.push(sql.into());
        self
    }

    /// Drop the connection when `sql` arrives: the request fails with
    /// [`ProtocolError::ConnectionClosed`] and the status becomes `Closed`.
    #[must_use]
    pub fn with_disconnect(mut self, sql: impl Into<String>) -> Self {
        self.disconnects.push(sql.into());
        self
    }

    fn disconnects_on(&self, sql: &str) -> bool {
        self.disconnects.iter().any(|d| d == sql)
    }

    fn hangs_on(&self, sql: &str) -> bool {
        self.hangs.iter().any(|h| h == sql)
    }

    fn failure_for(&self, sql: &str) -> Option<ProtocolError> {
        self.failures
            .iter()
            .find(|(s, _)| s == sql)
            .map(|(_, error)| error())
    }

    fn response_for(&self, sql: &str) -> Response {
        self.responses
            .iter()
            .find(|(s, _)| s == sql)
            .map_or_else(|| Response::Ok(OkPacket::default()), |(_, r)| r.clone())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field(
                "responses",
                &self.responses.iter().map(|(s, _)| s).collect::<Vec<_>>(),
            )
            .field(
                "failures",
                &self.failures.iter().map(|(s, _)| s).collect::<Vec<_>>(),
            )
            .field("hangs", &self.hangs)
            .field("disconnects", &self.disconnects)
            .finish()
    }
}

/// Remote control for a connection's reported [`Status`].
///
/// Stays usable after the connection has been moved into a session or pool.
#[derive(Debug, Clone)]
pub struct StatusSwitch {
    status: Arc<Mutex<Status>>,
}

impl StatusSwitch {
    /// Make the connection report `Closed`.
    pub fn close(&self) {
        *self.status.lock() = Status::Closed;
    }

    /// Set the reported status.
    pub fn set(&self, status: Status) {
        *self.status.lock() = status;
    }

    /// Current reported status.
    #[must_use]
    pub fn get(&self) -> Status {
        *self.status.lock()
    }
}

/// A [`ConnectionHandle`] that records every request and follows a [`Script`].
pub struct MockConnection {
    id: u64,
    log: RequestLog,
    script: Script,
    status: Arc<Mutex<Status>>,
}

impl MockConnection {
    /// Create a connection that records into `log`.
    #[must_use]
    pub fn new(id: u64, log: RequestLog) -> Self {
        Self::with_script(id, log, Script::new())
    }

    /// Create a connection following `script`.
    #[must_use]
    pub fn with_script(id: u64, log: RequestLog, script: Script) -> Self {
        Self {
            id,
            log,
            script,
            status: Arc::new(Mutex::new(Status::Open)),
        }
    }

    /// See [`Script::with_response`].
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: Response) -> Self {
        self.script = self.script.with_response(sql, response);
        self
    }

    /// See [`Script::with_failure`].
    #[must_use]
    pub fn with_failure<E>(mut self, sql: impl Into<String>, error: E) -> Self
    where
        E: Fn() -> ProtocolError + Send + Sync + 'static,
    {
        self.script = self.script.with_failure(sql, error);
        self
    }

    /// See [`Script::with_hang`].
    #[must_use]
    pub fn with_hang(mut self, sql: impl Into<String>) -> Self {
        self.script = self.script.with_hang(sql);
        self
    }

    /// Connection id used in the request log.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get a switch controlling this connection's reported status.
    #[must_use]
    pub fn status_switch(&self) -> StatusSwitch {
        StatusSwitch {
            status: Arc::clone(&self.status),
        }
    }
}

#[async_trait::async_trait]
impl ConnectionHandle for MockConnection {
    async fn send(&mut self, request: Request) -> Result<Response, ProtocolError> {
        tracing::trace!(connection_id = self.id, statement = %request, "mock request");
        self.log.record(self.id, request.clone());

        let Some(sql) = request.sql() else {
            return Ok(Response::Poisoned);
        };

        if self.script.disconnects_on(sql) {
            *self.status.lock() = Status::Closed;
            return Err(ProtocolError::ConnectionClosed);
        }
        if self.script.hangs_on(sql) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.script.failure_for(sql) {
            return Err(error);
        }
        Ok(self.script.response_for(sql))
    }

    fn status(&self) -> Status {
        *self.status.lock()
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection")
            .field("id", &self.id)
            .field("status", &*self.status.lock())
            .field("script", &self.script)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_records_and_answers() {
        let log = RequestLog::new();
        let mut conn = MockConnection::new(7, log.clone()).with_response(
            "UPDATE t SET x = 1",
            Response::Ok(OkPacket {
                affected_rows: 4,
                ..OkPacket::default()
            }),
        );

        let response = conn.send(Request::query("UPDATE t SET x = 1")).await.unwrap();
        assert_eq!(response.affected_rows(), Some(4));

        let response = conn.send(Request::Poison).await.unwrap();
        assert_eq!(response, Response::Poisoned);

        assert_eq!(log.statements_for(7), ["UPDATE t SET x = 1", "<poison>"]);
    }

    #[tokio::test]
    async fn test_scripted_failure_is_recorded() {
        let log = RequestLog::new();
        let mut conn = MockConnection::new(1, log.clone())
            .with_failure("BROKEN", || ProtocolError::server(1064, "42000", "syntax"));

        let err = conn.send(Request::query("BROKEN")).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Server { code: 1064, .. }));
        assert_eq!(log.statements(), ["BROKEN"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let mut conn = MockConnection::new(1, RequestLog::new()).with_hang("SELECT SLEEP(60)");

        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            conn.send(Request::query("SELECT SLEEP(60)")),
        )
        .await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_closes_status() {
        let script = Script::new().with_disconnect("KILL CONNECTION_ID()");
        let mut conn = MockConnection::with_script(1, RequestLog::new(), script);

        let err = conn
            .send(Request::query("KILL CONNECTION_ID()"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
        assert_eq!(conn.status(), Status::Closed);
    }

    #[test]
    fn test_status_switch() {
        let conn = MockConnection::new(1, RequestLog::new());
        let switch = conn.status_switch();
        assert_eq!(conn.status(), Status::Open);

        switch.close();
        assert_eq!(conn.status(), Status::Closed);
        assert_eq!(switch.get(), Status::Closed);
    }
}
