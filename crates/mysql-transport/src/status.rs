//! Connection health as seen by the pool.

/// Liveness of a connection transport.
///
/// A transport starts `Open` and may become `Closed`; it never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// The channel is open and no fatal failure has been recorded.
    #[default]
    Open,
    /// The channel was closed or a fatal failure was recorded.
    Closed,
}

impl Status {
    /// Check if the connection may still carry requests.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Fatal-failure record owned by a transport.
///
/// The only transition is `Healthy -> Failed`. The first failure reason is
/// kept; later failures do not overwrite it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Health {
    #[default]
    Healthy,
    Failed { reason: String },
}

impl Health {
    pub(crate) fn record_failure(&mut self, reason: impl Into<String>) {
        if matches!(self, Self::Healthy) {
            *self = Self::Failed {
                reason: reason.into(),
            };
        }
    }

    pub(crate) fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub(crate) fn reason(&self) -> Option<&str> {
        match self {
            Self::Healthy => None,
            Self::Failed { reason } => Some(reason),
        }
    }
}
