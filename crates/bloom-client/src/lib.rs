//! # Bloom Client
//!
//! Client for a remote Bloom filter service: create named filters, insert
//! keys, query membership, drop filters. Each operation is one remote call
//! bounded by a deadline.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure logic, no I/O
//!   - `HashPair` / `KeyHasher`: key to (FNV-1a, XXH3) digest pair
//!   - `CallContext`: caller deadline and cancellation
//!   - `ClientConfig`: endpoint and timeouts, with builder
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `FilterApi`: Driving port (inbound API)
//!   - `FilterTransport`: Driven port (the RPC channel)
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `FilterClient`: Implements `FilterApi` with per-call deadlines
//!
//! - **Protocol Layer** (`protocol/`): Wire messages and frame codec
//!
//! - **Adapters Layer** (`adapters/`): Transports
//!   - `TcpTransport`: Framed TCP connection
//!   - `InMemoryTransport`: In-process filter service
//!
//! ## Invariants
//!
//! - **Determinism**: a key always derives the same `HashPair`
//! - **Order**: `add`/`has` return one result per key, in key order
//! - **Bounded**: every call except `shutdown` finishes by
//!   `min(caller deadline, start + timeout)`
//! - **Terminal shutdown**: after `shutdown` every call fails with
//!   `ClientError::Closed`
//!
//! ## Usage Example
//!
//! ```ignore
//! use bloom_client::{CallContext, ClientConfigBuilder, FilterClient};
//! use std::time::Duration;
//!
//! let config = ClientConfigBuilder::new()
//!     .endpoint("127.0.0.1:8679")
//!     .timeout(Duration::from_millis(250))
//!     .build()?;
//! let client = FilterClient::connect(&config).await?;
//! let ctx = CallContext::background();
//!
//! client.create(&ctx, "users").await?;
//! client.add(&ctx, "users", &["alice", "bob"]).await?;
//!
//! let found = client.has(&ctx, "users", &["alice", "carol"]).await?;
//! assert!(found[0]);
//!
//! client.drop_filter("users").await?;
//! client.shutdown().await;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod protocol;
pub mod service;
pub mod telemetry;

// Re-exports for convenience
pub use adapters::{InMemoryTransport, TcpTransport};
pub use domain::{
    derive_hash_pair, derive_hash_pairs, CallContext, ClientConfig, ClientConfigBuilder,
    DefaultKeyHasher, HashPair, KeyHasher,
};
pub use error::{ClientError, CodecError, TransportError};
pub use metrics::{ClientMetrics, MetricsRecorder, MetricsSnapshot, NoOpMetrics};
pub use ports::{FilterApi, FilterTransport};
pub use service::FilterClient;
pub use telemetry::{init_logging, LogConfig};
