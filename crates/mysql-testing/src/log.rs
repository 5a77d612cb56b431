//! Shared request recording.

use std::sync::Arc;

use mysql_session::Request;
use parking_lot::Mutex;

/// Ordered record of every request mock connections received.
///
/// Cloning yields another view of the same log, so a provider and every
/// connection it hands out can append to one sequence.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    entries: Arc<Mutex<Vec<LoggedRequest>>>,
}

/// A single recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    /// Id of the connection that received the request.
    pub connection_id: u64,
    /// The request itself.
    pub request: Request,
}

impl RequestLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request.
    pub fn record(&self, connection_id: u64, request: Request) {
        self.entries.lock().push(LoggedRequest {
            connection_id,
            request,
        });
    }

    /// All recorded requests in order.
    #[must_use]
    pub fn entries(&self) -> Vec<LoggedRequest> {
        self.entries.lock().clone()
    }

    /// Requests rendered as text, poison marker included as `<poison>`.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.request.to_string())
            .collect()
    }

    /// Requests received by one connection, rendered as text.
    #[must_use]
    pub fn statements_for(&self, connection_id: u64) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.connection_id == connection_id)
            .map(|entry| entry.request.to_string())
            .collect()
    }

    /// Number of poison markers recorded.
    #[must_use]
    pub fn poison_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.request.is_poison())
            .count()
    }

    /// Number of recorded requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let log = RequestLog::new();
        let view = log.clone();

        log.record(1, Request::query("SELECT 1"));
        view.record(2, Request::Poison);

        assert_eq!(log.statements(), ["SELECT 1", "<poison>"]);
        assert_eq!(view.statements_for(2), ["<poison>"]);
        assert_eq!(log.poison_count(), 1);
        assert_eq!(log.len(), 2);

        view.clear();
        assert!(log.is_empty());
    }
}
