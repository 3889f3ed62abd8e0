//! Wire protocol for the Bloom filter service
//!
//! Four logical calls (create, add, has, drop) carried as length-prefixed
//! bincode frames. Responses to add/has hold one boolean per hash pair, in
//! request order.

pub mod codec;
pub mod requests;
pub mod responses;

pub use codec::{decode_frame, encode_frame, MAX_FRAME_LEN};
pub use requests::{FilterRequest, KeyRequest, Request, RequestFrame};
pub use responses::{error_codes, BoolResponse, ErrorResponse, Response, ResponseFrame};
