//! Filter Client
//!
//! Orchestrates hash derivation and bounded remote calls over an injected
//! [`FilterTransport`].
//!
//! Every operation except `shutdown` runs under a deadline derived when the
//! operation begins: `min(caller deadline, now + timeout)`. No retries are
//! made; every failure is returned to the caller as a [`ClientError`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::TcpTransport;
use crate::domain::{
    hash_keys, BoundedCall, CallContext, ClientConfig, DefaultKeyHasher, HashPair, KeyHasher,
};
use crate::error::{ClientError, TransportError};
use crate::metrics::{ClientMetrics, MetricsRecorder};
use crate::ports::{FilterApi, FilterTransport};
use crate::protocol::{FilterRequest, KeyRequest};

/// Client for one remote filter service endpoint
///
/// Safe to share between tasks; calls may be in flight concurrently. The
/// connection is released exactly once, by [`shutdown`](Self::shutdown).
pub struct FilterClient<T: FilterTransport = TcpTransport> {
    endpoint: String,
    timeout: Duration,
    /// `None` once shut down
    conn: RwLock<Option<Arc<T>>>,
    hasher: Box<dyn KeyHasher>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl FilterClient<TcpTransport> {
    /// Connect to the configured endpoint
    ///
    /// Blocks until connected or until the connect timeout elapses.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with(&CallContext::background(), config).await
    }

    /// Connect under the caller's own deadline and cancellation
    ///
    /// The dial is bounded by `min(ctx deadline, connect timeout)`. If that
    /// bound fires first the attempt is abandoned, no client is returned and
    /// the error is [`ClientError::DeadlineExceeded`].
    ///
    /// Firing the context's cancellation token instead abandons the attempt
    /// with [`ClientError::Cancelled`], the same error a cancelled operation
    /// returns. Callers that only bound construction by time never see it.
    pub async fn connect_with(ctx: &CallContext, config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let call = ctx.bounded(config.connect_timeout());
        let dial = TcpTransport::connect(&config.endpoint);
        let transport = run_bounded(&call, dial).await.map_err(|e| {
            warn!(endpoint = %config.endpoint, error = %e, "Failed to connect to filter service");
            e
        })?;

        info!(
            endpoint = %config.endpoint,
            timeout_ms = config.timeout_ms,
            "Connected to filter service"
        );
        Ok(Self::with_transport(transport, config.timeout()).endpoint(config.endpoint.clone()))
    }
}

impl<T: FilterTransport> FilterClient<T> {
    /// Wrap an established transport
    pub fn with_transport(transport: T, timeout: Duration) -> Self {
        Self {
            endpoint: String::new(),
            timeout,
            conn: RwLock::new(Some(Arc::new(transport))),
            hasher: Box::new(DefaultKeyHasher),
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    /// Label used in logs
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the key hasher
    pub fn with_hasher(mut self, hasher: impl KeyHasher + 'static) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    /// Replace the metrics recorder
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.read().await.is_none()
    }

    /// Hash pairs the client would send for `keys`
    pub fn hash_keys<K: AsRef<[u8]>>(&self, keys: &[K]) -> Vec<HashPair> {
        hash_keys(self.hasher.as_ref(), keys)
    }

    /// Create a filter on the server
    pub async fn create(&self, ctx: &CallContext, filter: &str) -> Result<(), ClientError> {
        let transport = self.transport().await?;
        let request = FilterRequest {
            name: filter.to_string(),
        };

        let call = ctx.bounded(self.timeout);
        self.execute("create", filter, 0, &call, transport.create_filter(request))
            .await
    }

    /// Insert keys; one result per key, `true` if newly inserted
    pub async fn add<K: AsRef<[u8]>>(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[K],
    ) -> Result<Vec<bool>, ClientError> {
        let hashes = self.hash_keys(keys);
        self.add_hashes(ctx, filter, hashes).await
    }

    /// Insert pre-derived hash pairs
    pub async fn add_hashes(
        &self,
        ctx: &CallContext,
        filter: &str,
        hashes: Vec<HashPair>,
    ) -> Result<Vec<bool>, ClientError> {
        let transport = self.transport().await?;
        let expected = hashes.len();
        let request = KeyRequest {
            name: filter.to_string(),
            hashes,
        };

        let call = ctx.bounded(self.timeout);
        let remote = async move { check_len(transport.add(request).await?, expected) };
        self.execute("add", filter, expected, &call, remote).await
    }

    /// Query keys; one result per key, `true` if possibly present
    pub async fn has<K: AsRef<[u8]>>(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[K],
    ) -> Result<Vec<bool>, ClientError> {
        let hashes = self.hash_keys(keys);
        self.has_hashes(ctx, filter, hashes).await
    }

    /// Query pre-derived hash pairs
    pub async fn has_hashes(
        &self,
        ctx: &CallContext,
        filter: &str,
        hashes: Vec<HashPair>,
    ) -> Result<Vec<bool>, ClientError> {
        let transport = self.transport().await?;
        let expected = hashes.len();
        let request = KeyRequest {
            name: filter.to_string(),
            hashes,
        };

        let call = ctx.bounded(self.timeout);
        let remote = async move { check_len(transport.has(request).await?, expected) };
        self.execute("has", filter, expected, &call, remote).await
    }

    /// Remove a filter from the server
    ///
    /// Bounded only by the client timeout, never by a caller context.
    pub async fn drop_filter(&self, filter: &str) -> Result<(), ClientError> {
        let transport = self.transport().await?;
        let request = FilterRequest {
            name: filter.to_string(),
        };

        let call = CallContext::background().bounded(self.timeout);
        self.execute("drop", filter, 0, &call, transport.drop_filter(request))
            .await
    }

    /// Close the connection
    ///
    /// The first call releases the transport; later calls do nothing. Calls
    /// already in flight finish or fail with a closed/connection error.
    pub async fn shutdown(&self) {
        let taken = self.conn.write().await.take();
        match taken {
            Some(transport) => {
                transport.close().await;
                info!(endpoint = %self.endpoint, "Filter client shut down");
            }
            None => debug!(endpoint = %self.endpoint, "Filter client already shut down"),
        }
    }

    async fn transport(&self) -> Result<Arc<T>, ClientError> {
        let transport = self.conn.read().await.as_ref().cloned();
        match transport {
            Some(t) => Ok(t),
            None => {
                self.metrics
                    .record_call(0, Duration::ZERO, Some(&ClientError::Closed));
                Err(ClientError::Closed)
            }
        }
    }

    async fn execute<R, F>(
        &self,
        method: &'static str,
        filter: &str,
        keys: usize,
        call: &BoundedCall,
        remote: F,
    ) -> Result<R, ClientError>
    where
        F: Future<Output = Result<R, TransportError>>,
    {
        debug!(
            endpoint = %self.endpoint,
            method = method,
            filter = filter,
            keys = keys,
            timeout_ms = self.timeout.as_millis() as u64,
            "Filter call"
        );

        let result = run_bounded(call, remote).await;
        let elapsed = call.elapsed();
        self.metrics.record_call(keys, elapsed, result.as_ref().err());

        match &result {
            Ok(_) => debug!(
                method = method,
                filter = filter,
                elapsed_us = elapsed.as_micros() as u64,
                "Filter call succeeded"
            ),
            Err(e @ (ClientError::DeadlineExceeded { .. } | ClientError::Connection(_))) => warn!(
                endpoint = %self.endpoint,
                method = method,
                filter = filter,
                error = %e,
                "Filter call failed"
            ),
            Err(e) => debug!(method = method, filter = filter, error = %e, "Filter call rejected"),
        }

        result
    }
}

/// Drive `remote` until it resolves, the deadline passes or the caller
/// cancels, whichever comes first
async fn run_bounded<R, F>(call: &BoundedCall, remote: F) -> Result<R, ClientError>
where
    F: Future<Output = Result<R, TransportError>>,
{
    if call.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    if call.is_expired() {
        return Err(deadline_exceeded(call));
    }

    tokio::select! {
        biased;
        _ = call.cancelled() => Err(ClientError::Cancelled),
        outcome = tokio::time::timeout_at(call.deadline(), remote) => match outcome {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => Err(deadline_exceeded(call)),
        },
    }
}

fn deadline_exceeded(call: &BoundedCall) -> ClientError {
    ClientError::DeadlineExceeded {
        elapsed_ms: call.elapsed().as_millis() as u64,
    }
}

fn check_len(results: Vec<bool>, expected: usize) -> Result<Vec<bool>, TransportError> {
    if results.len() != expected {
        return Err(TransportError::UnexpectedResponse(format!(
            "{} results for {} keys",
            results.len(),
            expected
        )));
    }
    Ok(results)
}

#[async_trait]
impl<T: FilterTransport + 'static> FilterApi for FilterClient<T> {
    async fn create(&self, ctx: &CallContext, filter: &str) -> Result<(), ClientError> {
        FilterClient::create(self, ctx, filter).await
    }

    async fn add(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<bool>, ClientError> {
        FilterClient::add(self, ctx, filter, keys).await
    }

    async fn has(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<bool>, ClientError> {
        FilterClient::has(self, ctx, filter, keys).await
    }

    async fn drop_filter(&self, filter: &str) -> Result<(), ClientError> {
        FilterClient::drop_filter(self, filter).await
    }

    async fn shutdown(&self) {
        FilterClient::shutdown(self).await
    }
}
