//! Inbound Ports (Driving Ports)
//!
//! The API callers use to reach a remote filter.

use async_trait::async_trait;

use crate::domain::CallContext;
use crate::error::ClientError;

/// Bounded-time operations against a named remote filter (Driving Port)
#[async_trait]
pub trait FilterApi: Send + Sync {
    /// Create a filter on the server
    async fn create(&self, ctx: &CallContext, filter: &str) -> Result<(), ClientError>;

    /// Insert keys
    ///
    /// # Returns
    /// One entry per key, `true` when the server reports the key as newly
    /// inserted.
    async fn add(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<bool>, ClientError>;

    /// Query keys
    ///
    /// # Returns
    /// One entry per key, `true` when the key is possibly present. False
    /// positives are inherent to Bloom filters.
    async fn has(
        &self,
        ctx: &CallContext,
        filter: &str,
        keys: &[&[u8]],
    ) -> Result<Vec<bool>, ClientError>;

    /// Remove a filter
    ///
    /// Not bounded by any caller context, only by the client timeout, so a
    /// cancelled caller cannot skip cleanup.
    async fn drop_filter(&self, filter: &str) -> Result<(), ClientError>;

    /// Close the connection. Later calls fail with [`ClientError::Closed`].
    async fn shutdown(&self);
}
