//! In-memory transport
//!
//! A local stand-in for the filter service: keeps one bit array per named
//! filter and sets/probes the k positions double hashing derives from each
//! [`HashPair`]. Useful for tests and for running callers without a server.
//!
//! Optional injected latency makes it usable for deadline testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bitvec::prelude::*;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;
use crate::ports::FilterTransport;
use crate::protocol::{error_codes, FilterRequest, KeyRequest};

/// Bits per filter unless configured
pub const DEFAULT_FILTER_BITS: usize = 1 << 16;

/// Hash functions per key unless configured
pub const DEFAULT_HASH_COUNT: usize = 7;

/// In-process filter service
pub struct InMemoryTransport {
    filters: RwLock<HashMap<String, BitVec>>,
    bits: usize,
    hash_count: usize,
    latency: Option<Duration>,
    calls: AtomicU64,
    closed: CancellationToken,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_geometry(DEFAULT_FILTER_BITS, DEFAULT_HASH_COUNT)
    }

    /// Filters with `bits` bits probed at `hash_count` positions per key
    pub fn with_geometry(bits: usize, hash_count: usize) -> Self {
        Self {
            filters: RwLock::new(HashMap::new()),
            bits: bits.max(1),
            hash_count: hash_count.max(1),
            latency: None,
            calls: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Delay every call by `latency` before it is served
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Calls that reached the service
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub async fn contains_filter(&self, name: &str) -> bool {
        self.filters.read().await.contains_key(name)
    }

    async fn enter(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::select! {
                _ = self.closed.cancelled() => return Err(TransportError::Closed),
                _ = tokio::time::sleep(latency) => {}
            }
        }
        Ok(())
    }

    fn not_found(name: &str) -> TransportError {
        TransportError::Remote {
            code: error_codes::FILTER_NOT_FOUND,
            message: format!("filter not found: {}", name),
        }
    }
}

#[async_trait]
impl FilterTransport for InMemoryTransport {
    async fn create_filter(&self, request: FilterRequest) -> Result<(), TransportError> {
        self.enter().await?;

        let mut filters = self.filters.write().await;
        if filters.contains_key(&request.name) {
            return Err(TransportError::Remote {
                code: error_codes::FILTER_EXISTS,
                message: format!("filter already exists: {}", request.name),
            });
        }

        debug!(filter = %request.name, bits = self.bits, "Filter created");
        filters.insert(request.name, bitvec![0; self.bits]);
        Ok(())
    }

    async fn add(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError> {
        self.enter().await?;

        let mut filters = self.filters.write().await;
        let bits = filters
            .get_mut(&request.name)
            .ok_or_else(|| Self::not_found(&request.name))?;

        Ok(request
            .hashes
            .iter()
            .map(|pair| {
                let mut inserted = false;
                for pos in pair.positions(self.hash_count, self.bits) {
                    if !bits[pos] {
                        bits.set(pos, true);
                        inserted = true;
                    }
                }
                inserted
            })
            .collect())
    }

    async fn has(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError> {
        self.enter().await?;

        let filters = self.filters.read().await;
        let bits = filters
            .get(&request.name)
            .ok_or_else(|| Self::not_found(&request.name))?;

        Ok(request
            .hashes
            .iter()
            .map(|pair| {
                pair.positions(self.hash_count, self.bits)
                    .into_iter()
                    .all(|pos| bits[pos])
            })
            .collect())
    }

    async fn drop_filter(&self, request: FilterRequest) -> Result<(), TransportError> {
        self.enter().await?;

        match self.filters.write().await.remove(&request.name) {
            Some(_) => {
                debug!(filter = %request.name, "Filter dropped");
                Ok(())
            }
            None => Err(Self::not_found(&request.name)),
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}
