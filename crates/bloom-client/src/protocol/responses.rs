//! Response messages

use serde::{Deserialize, Serialize};

/// Per-key results for add and has
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolResponse {
    pub results: Vec<bool>,
}

/// Error reported by the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Success without a payload (create, drop)
    Empty,
    Bools(BoolResponse),
    Error(ErrorResponse),
}

/// Response plus the id of the request it answers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    pub response: Response,
}

/// Error codes for filter operations
pub mod error_codes {
    /// Named filter does not exist
    pub const FILTER_NOT_FOUND: u32 = 7001;
    /// Filter already exists
    pub const FILTER_EXISTS: u32 = 7002;
    /// Malformed request
    pub const INVALID_REQUEST: u32 = 7003;
    /// Internal error
    pub const INTERNAL_ERROR: u32 = 7099;
}
