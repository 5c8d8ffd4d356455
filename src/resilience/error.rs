//! Error taxonomy for protected calls.
//!
//! Every failure a unit of work reports carries an [`ErrorKind`] tag. The tag
//! drives severity classification for observability and recovery-strategy
//! lookup; it never changes breaker or retry behaviour.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used for opaque upstream causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Caller-visible failure category of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    CircuitOpen,
    Api,
    Authentication,
    RateLimit,
    Validation,
    NotFound,
    Cancelled,
    /// Any tag not covered above.
    Other(String),
}

impl ErrorKind {
    /// Stable tag used in logs, metrics labels and health reports.
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Api => "api",
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other(tag) => tag,
        }
    }

    /// Severity of this kind of failure.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::CircuitOpen => Severity::Critical,
            ErrorKind::Api | ErrorKind::Authentication | ErrorKind::RateLimit => Severity::High,
            ErrorKind::Validation | ErrorKind::NotFound => Severity::Medium,
            ErrorKind::Cancelled | ErrorKind::Other(_) => Severity::Low,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ErrorKind {
    /// Parses a tag. Accepts the snake_case tags produced by [`ErrorKind::as_str`]
    /// as well as exception-style names such as `TimeoutError` or `RateLimitError`.
    fn from(tag: &str) -> Self {
        let normalized: String = tag
            .trim()
            .trim_end_matches("Error")
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "connection" => ErrorKind::Connection,
            "timeout" => ErrorKind::Timeout,
            "circuitopen" | "circuitbreakeropen" => ErrorKind::CircuitOpen,
            "api" => ErrorKind::Api,
            "authentication" | "auth" => ErrorKind::Authentication,
            "ratelimit" => ErrorKind::RateLimit,
            "validation" => ErrorKind::Validation,
            "notfound" => ErrorKind::NotFound,
            "cancelled" | "canceled" => ErrorKind::Cancelled,
            _ => ErrorKind::Other(tag.trim().to_string()),
        }
    }
}

impl From<String> for ErrorKind {
    fn from(tag: String) -> Self {
        ErrorKind::from(tag.as_str())
    }
}

/// Severity classification, used purely for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a unit of work.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct OperationError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl OperationError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a breaker refused to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The breaker is open and the recovery timeout has not elapsed.
    Open,
    /// The breaker is half-open and its trial budget is spent.
    HalfOpenLimit,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Open => f.write_str("is OPEN"),
            RejectReason::HalfOpenLimit => f.write_str("half-open limit exceeded"),
        }
    }
}

/// Errors surfaced by the invocation layer.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Gating rejection. The operation was not invoked.
    #[error("circuit breaker '{name}' {reason}")]
    CircuitOpen { name: String, reason: RejectReason },

    /// The unit of work failed.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// A composed caller required recovery and it was not achieved.
    #[error("recovery failed for {kind} error")]
    RecoveryFailed {
        kind: ErrorKind,
        #[source]
        error: Box<GuardError>,
    },

    /// The caller's cancellation signal or deadline fired.
    #[error("operation cancelled")]
    Cancelled {
        /// Most recent attempt error, if any attempt had failed.
        #[source]
        last: Option<Box<GuardError>>,
    },
}

impl GuardError {
    pub(crate) fn cancelled(last: Option<GuardError>) -> Self {
        GuardError::Cancelled {
            last: last.map(Box::new),
        }
    }

    /// Error kind used for classification and recovery lookup.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            GuardError::Operation(e) => e.kind().clone(),
            GuardError::RecoveryFailed { kind, .. } => kind.clone(),
            GuardError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GuardError::CircuitOpen { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GuardError::Cancelled { .. })
    }
}

/// Result type for protected calls.
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert_eq!(ErrorKind::Connection.severity(), Severity::Critical);
        assert_eq!(ErrorKind::Timeout.severity(), Severity::Critical);
        assert_eq!(ErrorKind::CircuitOpen.severity(), Severity::Critical);
        assert_eq!(ErrorKind::Authentication.severity(), Severity::High);
        assert_eq!(ErrorKind::RateLimit.severity(), Severity::High);
        assert_eq!(ErrorKind::NotFound.severity(), Severity::Medium);
        assert_eq!(ErrorKind::Other("KeyError".into()).severity(), Severity::Low);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ErrorKind::from("TimeoutError"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from("rate_limit"), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from("CircuitBreakerOpenError"), ErrorKind::CircuitOpen);
        assert_eq!(ErrorKind::from("not_found"), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from("quota"), ErrorKind::Other("quota".into()));
    }

    #[test]
    fn test_error_display() {
        let err = GuardError::from(OperationError::timeout("upstream took 30s"));
        assert_eq!(err.to_string(), "timeout error: upstream took 30s");
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err = GuardError::CircuitOpen {
            name: "openrouter".into(),
            reason: RejectReason::Open,
        };
        assert_eq!(err.to_string(), "circuit breaker 'openrouter' is OPEN");
        assert_eq!(err.severity(), Severity::Critical);
    }

    #[test]
    fn test_cancelled_keeps_last_error() {
        let err = GuardError::cancelled(Some(OperationError::api("503").into()));
        match &err {
            GuardError::Cancelled { last: Some(last) } => assert_eq!(last.kind(), ErrorKind::Api),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
