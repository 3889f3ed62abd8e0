//! Ports Layer
//!
//! - Driving Port (inbound): `FilterApi` for callers
//! - Driven Port (outbound): `FilterTransport` for the RPC channel

pub mod inbound;
pub mod outbound;

pub use inbound::FilterApi;
pub use outbound::FilterTransport;
