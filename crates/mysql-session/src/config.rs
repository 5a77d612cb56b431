//! Session configuration.

use std::time::Duration;

/// Per-session settings.
///
/// This struct is marked `#[non_exhaustive]`; construct it with
/// [`SessionConfig::new`] and the builder methods.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct SessionConfig {
    /// Upper bound on a single request round trip.
    ///
    /// A request that exceeds it is abandoned. The connection then has an
    /// unread response in flight, so the session is released poisoned.
    /// `None` waits indefinitely.
    pub command_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }
}
