//! Outbound Ports (Driven Ports)
//!
//! The RPC channel the client drives. Implementations own the connection and
//! decide how concurrent calls share it.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::protocol::{FilterRequest, KeyRequest};

/// Connection to a remote filter service (Driven Port)
///
/// Calls must be safe to issue concurrently. After [`close`](Self::close)
/// every call, including ones already in flight, fails with
/// [`TransportError::Closed`] or a connection error.
#[async_trait]
pub trait FilterTransport: Send + Sync {
    async fn create_filter(&self, request: FilterRequest) -> Result<(), TransportError>;

    /// Insert hashes, one result per pair
    async fn add(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError>;

    /// Probe hashes, one result per pair
    async fn has(&self, request: KeyRequest) -> Result<Vec<bool>, TransportError>;

    async fn drop_filter(&self, request: FilterRequest) -> Result<(), TransportError>;

    /// Release the connection. Idempotent.
    async fn close(&self);
}
