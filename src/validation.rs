//! Result of a single health-check probe.

use std::fmt;
use std::time::{Duration, Instant};

/// Category of a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    Success,
    Timeout,
    ConnectionFailed,
    AuthenticationFailed,
    InvalidResponse,
    /// Anything the checker could not classify more precisely.
    Exception,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationKind::Success => "success",
            ValidationKind::Timeout => "timeout",
            ValidationKind::ConnectionFailed => "connection failed",
            ValidationKind::AuthenticationFailed => "authentication failed",
            ValidationKind::InvalidResponse => "invalid response",
            ValidationKind::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// Immutable outcome of one probe.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    kind: ValidationKind,
    elapsed: Duration,
    status: Option<u16>,
    error: Option<String>,
    validated_at: Instant,
}

impl ValidationOutcome {
    /// A successful probe.
    pub fn success(elapsed: Duration, status: u16) -> Self {
        Self {
            kind: ValidationKind::Success,
            elapsed,
            status: Some(status),
            error: None,
            validated_at: Instant::now(),
        }
    }

    /// A probe that did not finish within its deadline.
    pub fn timeout(elapsed: Duration) -> Self {
        Self {
            kind: ValidationKind::Timeout,
            elapsed,
            status: None,
            error: Some("Timeout".to_string()),
            validated_at: Instant::now(),
        }
    }

    /// A failed probe of the given kind.
    pub fn failed(kind: ValidationKind, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            kind,
            elapsed,
            status: None,
            error: Some(error.into()),
            validated_at: Instant::now(),
        }
    }

    /// Attach the HTTP status code seen by a failed probe.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the measured duration, e.g. with the total of several probes.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == ValidationKind::Success
    }

    pub fn kind(&self) -> ValidationKind {
        self.kind
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn validated_at(&self) -> Instant {
        self.validated_at
    }
}
