//! Per-call deadlines and cancellation
//!
//! A [`CallContext`] carries the caller's own bound on an operation: an
//! optional deadline and an optional cancellation token. The client narrows
//! it with its configured timeout at the moment the operation begins, so the
//! effective deadline is always `min(caller deadline, now + timeout)`.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest bound applied to a deadline (about 30 years); longer timeouts are
/// clamped so `Instant` arithmetic cannot overflow
const MAX_BOUND: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + timeout`, clamped to [`MAX_BOUND`]
fn deadline_after(from: Instant, timeout: Duration) -> Instant {
    from + timeout.min(MAX_BOUND)
}

/// Caller-supplied deadline and cancellation for one operation.
///
/// Cloning shares the cancellation token; cancelling one clone aborts every
/// call using it and nothing else.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// Unbounded context with no cancellation
    pub fn background() -> Self {
        Self::default()
    }

    /// Context expiring `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Narrow the deadline to at most `timeout` from now
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(deadline_after(Instant::now(), timeout))
    }

    /// Narrow the deadline to at most `deadline`
    ///
    /// An earlier existing deadline wins.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attach a cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Resolves when the attached token is cancelled, never otherwise
    pub async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// Effective context for an operation bounded by `timeout`
    ///
    /// Counted from now. Keeps the caller's cancellation token. Timeouts
    /// longer than about 30 years are clamped.
    pub fn bounded(&self, timeout: Duration) -> BoundedCall {
        let started = Instant::now();
        let limit = deadline_after(started, timeout);
        let deadline = match self.deadline {
            Some(caller) => caller.min(limit),
            None => limit,
        };

        BoundedCall {
            started,
            deadline,
            cancel: self.cancel.clone(),
        }
    }
}

/// A context narrowed by the client timeout. Always has a deadline.
#[derive(Clone, Debug)]
pub struct BoundedCall {
    started: Instant,
    deadline: Instant,
    cancel: Option<CancellationToken>,
}

impl BoundedCall {
    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline <= Instant::now()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    pub async fn cancelled(&self) {
        match &self.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }
}
