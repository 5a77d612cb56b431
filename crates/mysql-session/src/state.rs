//! Session lifecycle state.
//!
//! ## State Transitions
//!
//! ```text
//! Active -> Discarded  (via discard() outside a transaction)
//! Active -> Discarding (via discard() inside a transaction)
//! Discarding -> Discarded (outermost transaction finished, marker sent)
//! Active -> Broken    (request abandoned by a command timeout)
//! Active | Discarding | Discarded | Broken -> Released (connection handed back to the provider)
//! ```
//!
//! `Discarding`, `Discarded` and `Broken` sessions are released through the
//! poisoned path. A `Discarding` session still sends `ROLLBACK`, nothing else.

/// Runtime state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connection bound and usable.
    #[default]
    Active,
    /// Caller discarded the session inside a transaction; the poison marker
    /// is held back until the open transactions have been rolled back.
    Discarding,
    /// Caller discarded the session; the poison marker has been sent.
    Discarded,
    /// A request was abandoned mid-flight; wire state is unknown.
    Broken,
    /// Connection returned to the provider.
    Released,
}

impl SessionState {
    /// Check if requests may still be sent.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if a `ROLLBACK` may still be sent.
    #[must_use]
    pub fn can_roll_back(&self) -> bool {
        matches!(self, Self::Active | Self::Discarding)
    }

    /// Check if the connection must be evicted rather than pooled.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        matches!(self, Self::Discarding | Self::Discarded | Self::Broken)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Discarding => write!(f, "discarding"),
            Self::Discarded => write!(f, "discarded"),
            Self::Broken => write!(f, "broken"),
            Self::Released => write!(f, "released"),
        }
    }
}
