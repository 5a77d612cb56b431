//! Counting connection provider.

use std::sync::atomic::{AtomicU64, Ordering};

use mysql_session::{ConnectionError, ConnectionProvider};
use parking_lot::Mutex;

use crate::log::RequestLog;
use crate::mock_connection::{MockConnection, Script, StatusSwitch};

/// Something a [`MockProvider`] was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    /// A connection was handed out.
    Acquired(u64),
    /// A connection came back through `release`.
    Released(u64),
    /// A connection came back through `release_poisoned`.
    ReleasedPoisoned(u64),
    /// `close` was called.
    Closed,
}

/// A [`ConnectionProvider`] that hands out [`MockConnection`]s and records
/// every call made on it.
///
/// All connections share one [`RequestLog`] and follow the same [`Script`].
#[derive(Debug, Default)]
pub struct MockProvider {
    log: RequestLog,
    script: Script,
    refuse_acquire: bool,
    next_id: AtomicU64,
    events: Mutex<Vec<ProviderEvent>>,
    switches: Mutex<Vec<StatusSwitch>>,
}

impl MockProvider {
    /// Create a provider whose connections answer everything with OK.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider whose connections follow `script`.
    #[must_use]
    pub fn with_script(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Make every `acquire` fail with [`ConnectionError::Unavailable`].
    #[must_use]
    pub fn refuse_acquire(mut self) -> Self {
        self.refuse_acquire = true;
        self
    }

    /// Shared log of requests received by any connection.
    #[must_use]
    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    /// Every call made on this provider, in order.
    #[must_use]
    pub fn events(&self) -> Vec<ProviderEvent> {
        self.events.lock().clone()
    }

    /// Number of `acquire` calls that handed out a connection.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.count(|e| matches!(e, ProviderEvent::Acquired(_)))
    }

    /// Number of `release` calls.
    #[must_use]
    pub fn released(&self) -> usize {
        self.count(|e| matches!(e, ProviderEvent::Released(_)))
    }

    /// Number of `release_poisoned` calls.
    #[must_use]
    pub fn released_poisoned(&self) -> usize {
        self.count(|e| matches!(e, ProviderEvent::ReleasedPoisoned(_)))
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn closed(&self) -> usize {
        self.count(|e| matches!(e, ProviderEvent::Closed))
    }

    /// Status switch of the `n`th connection handed out, counting from zero.
    #[must_use]
    pub fn status_switch(&self, n: usize) -> Option<StatusSwitch> {
        self.switches.lock().get(n).cloned()
    }

    fn count(&self, pred: impl Fn(&ProviderEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, event: ProviderEvent) {
        tracing::trace!(?event, "mock provider event");
        self.events.lock().push(event);
    }
}

#[async_trait::async_trait]
impl ConnectionProvider for MockProvider {
    type Handle = MockConnection;

    async fn acquire(&self) -> Result<MockConnection, ConnectionError> {
        if self.refuse_acquire {
            return Err(ConnectionError::Unavailable("mock provider refused".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let conn = MockConnection::with_script(id, self.log.clone(), self.script.clone());
        self.switches.lock().push(conn.status_switch());
        self.push(ProviderEvent::Acquired(id));
        Ok(conn)
    }

    fn release(&self, handle: MockConnection) {
        self.push(ProviderEvent::Released(handle.id()));
    }

    fn release_poisoned(&self, handle: MockConnection) {
        self.push(ProviderEvent::ReleasedPoisoned(handle.id()));
    }

    async fn close(&self) {
        self.push(ProviderEvent::Closed);
    }
}
