//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the `FilterTransport` port.
//!
//! ## Adapters
//!
//! - `TcpTransport` - Framed TCP connection to a remote filter service
//! - `InMemoryTransport` - In-process filter service for tests and local runs

pub mod in_memory;
pub mod tcp_transport;

pub use in_memory::InMemoryTransport;
pub use tcp_transport::TcpTransport;
