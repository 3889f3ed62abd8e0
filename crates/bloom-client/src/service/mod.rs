//! Service Layer
//!
//! `FilterClient` implements the `FilterApi` port on top of a
//! `FilterTransport`.

pub mod filter_client;

pub use filter_client::FilterClient;
