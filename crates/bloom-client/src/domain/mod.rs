//! Domain Layer - Pure client logic
//!
//! This layer contains:
//! - Key to hash pair derivation
//! - Per-call deadlines and cancellation
//! - Client configuration
//!
//! RULES:
//! - No I/O operations
//! - Pure functions where possible

pub mod config;
pub mod deadline;
pub mod hash_functions;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use deadline::{BoundedCall, CallContext};
pub use hash_functions::{
    derive_hash_pair, derive_hash_pairs, fnv1a_64, hash_keys, DefaultKeyHasher, HashPair,
    KeyHasher,
};
