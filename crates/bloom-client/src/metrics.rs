//! Metrics hooks for remote filter calls
//!
//! Counts call outcomes, keys sent and cumulative latency for one client.
//!
//! ## Usage
//!
//! ```ignore
//! use bloom_client::metrics::ClientMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(ClientMetrics::new());
//! let client = FilterClient::with_transport(transport, timeout).with_metrics(metrics.clone());
//!
//! client.has(&ctx, "users", &["alice"]).await?;
//! assert_eq!(metrics.snapshot().calls_started, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::ClientError;

/// Thread-safe counters for filter client calls
#[derive(Default)]
pub struct ClientMetrics {
    /// Total calls issued
    pub calls_started: AtomicU64,
    /// Calls that returned a full result
    pub calls_succeeded: AtomicU64,
    /// Calls that ran past their deadline
    pub deadline_exceeded: AtomicU64,
    /// Calls aborted by caller cancellation
    pub cancelled: AtomicU64,
    /// Transport failures
    pub connection_errors: AtomicU64,
    /// Server rejections
    pub application_errors: AtomicU64,
    /// Calls made after shutdown
    pub closed_errors: AtomicU64,
    /// Malformed or mismatched responses
    pub protocol_errors: AtomicU64,
    /// Keys sent with add/has
    pub keys_sent: AtomicU64,
    /// Cumulative call time in nanoseconds
    pub call_time_ns: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished call
    ///
    /// # Arguments
    /// * `keys` - Keys carried by the call (0 for create/drop)
    /// * `duration` - Wall time from start to result
    /// * `error` - The error, if the call failed
    pub fn record_call(&self, keys: usize, duration: Duration, error: Option<&ClientError>) {
        self.calls_started.fetch_add(1, Ordering::Relaxed);
        self.keys_sent.fetch_add(keys as u64, Ordering::Relaxed);
        self.call_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        let counter = match error {
            None => &self.calls_succeeded,
            Some(ClientError::DeadlineExceeded { .. }) => &self.deadline_exceeded,
            Some(ClientError::Cancelled) => &self.cancelled,
            Some(ClientError::Connection(_)) => &self.connection_errors,
            Some(ClientError::Application { .. }) => &self.application_errors,
            Some(ClientError::Closed) => &self.closed_errors,
            Some(ClientError::Protocol(_)) | Some(ClientError::InvalidConfig(_)) => {
                &self.protocol_errors
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_started: self.calls_started.load(Ordering::Relaxed),
            calls_succeeded: self.calls_succeeded.load(Ordering::Relaxed),
            deadline_exceeded: self.deadline_exceeded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            application_errors: self.application_errors.load(Ordering::Relaxed),
            closed_errors: self.closed_errors.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            keys_sent: self.keys_sent.load(Ordering::Relaxed),
            avg_call_ns: self.avg_call_time_ns(),
        }
    }

    /// Average call time in nanoseconds
    pub fn avg_call_time_ns(&self) -> u64 {
        let total = self.call_time_ns.load(Ordering::Relaxed);
        let count = self.calls_started.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        for counter in [
            &self.calls_started,
            &self.calls_succeeded,
            &self.deadline_exceeded,
            &self.cancelled,
            &self.connection_errors,
            &self.application_errors,
            &self.closed_errors,
            &self.protocol_errors,
            &self.keys_sent,
            &self.call_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls_started: u64,
    pub calls_succeeded: u64,
    pub deadline_exceeded: u64,
    pub cancelled: u64,
    pub connection_errors: u64,
    pub application_errors: u64,
    pub closed_errors: u64,
    pub protocol_errors: u64,
    pub keys_sent: u64,
    pub avg_call_ns: u64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to forward call outcomes to an external metrics
/// system.
pub trait MetricsRecorder: Send + Sync {
    fn record_call(&self, keys: usize, duration: Duration, error: Option<&ClientError>);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_call(&self, _: usize, _: Duration, _: Option<&ClientError>) {}
}

impl MetricsRecorder for ClientMetrics {
    fn record_call(&self, keys: usize, duration: Duration, error: Option<&ClientError>) {
        ClientMetrics::record_call(self, keys, duration, error);
    }
}
