use std::fmt;

/// Machine-readable error kinds surfaced by the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Unavailable,
    Timeout,
    Transport,
    NotFound,
    NotSynced,
    Decode,
}

impl ErrorKind {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "E1001",
            Self::Unavailable => "E2001",
            Self::Timeout => "E2002",
            Self::Transport => "E2003",
            Self::NotFound => "E3001",
            Self::NotSynced => "E3002",
            Self::Decode => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid request",
            Self::Unavailable => "Backend unavailable",
            Self::Timeout => "Backend timed out",
            Self::Transport => "Transport error",
            Self::NotFound => "Event not found",
            Self::NotSynced => "Event not synced",
            Self::Decode => "Unexpected column encoding",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidInput => Some("Check the event fields and query bounds."),
            Self::Unavailable => Some("Check that the event database is reachable and writable."),
            Self::Timeout => Some("Retry once the other writer has finished."),
            Self::Transport | Self::NotFound => None,
            Self::NotSynced => Some("Sync the event before deleting it."),
            Self::Decode => Some("The row was written by an incompatible version; rewrite it."),
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout | Self::Transport)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors returned by the event store and the column backend beneath it.
///
/// Backend failures are propagated with their kind unchanged; this layer
/// never retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request itself was malformed (bad predicate, invalid event).
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The backend cannot serve requests right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("backend timed out: {0}")]
    Timeout(String),

    /// Any other failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// No live columns exist for the requested row.
    #[error("event {0} not found")]
    NotFound(String),

    /// Delete was attempted on an event that was never written.
    #[error("event not synced to database yet")]
    NotSynced,

    /// A stored column could not be decoded.
    #[error("cannot decode column {column} of row {key}: {reason}")]
    Decode {
        key: String,
        column: String,
        reason: String,
    },
}

impl StoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::Transport,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NotSynced => ErrorKind::NotSynced,
            Self::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.kind().hint()
    }
}
