//! Cancellation and deadlines for protected calls.
//!
//! A [`Cancel`] combines an optional [`CancellationToken`] with an optional
//! deadline. Retry loops race both the operation and the inter-attempt sleep
//! against it, so a fired signal stops further attempts promptly.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation signal and/or deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancel {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Cancel {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn token(token: CancellationToken) -> Self {
        Self {
            token: Some(token),
            deadline: None,
        }
    }

    pub fn deadline(at: Instant) -> Self {
        Self {
            token: None,
            deadline: Some(at),
        }
    }

    /// Deadline `after` from now.
    pub fn timeout(after: Duration) -> Self {
        Self::deadline(Instant::now() + after)
    }

    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(at, |current| current.min(at)));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn cancelled(&self) {
        match (&self.token, self.deadline) {
            (Some(token), Some(at)) => {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = sleep_until(at) => {}
                }
            }
            (Some(token), None) => token.cancelled().await,
            (None, Some(at)) => sleep_until(at).await,
            (None, None) => std::future::pending::<()>().await,
        }
    }
}
