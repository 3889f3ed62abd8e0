//! Request messages

use serde::{Deserialize, Serialize};

use crate::domain::HashPair;

/// Request naming a filter (create, drop)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub name: String,
}

/// Request carrying hash pairs for a filter (add, has)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRequest {
    pub name: String,
    /// One pair per caller key, in caller order
    pub hashes: Vec<HashPair>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    CreateFilter(FilterRequest),
    Add(KeyRequest),
    Has(KeyRequest),
    DropFilter(FilterRequest),
}

impl Request {
    /// Short name for logs
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateFilter(_) => "create_filter",
            Self::Add(_) => "add",
            Self::Has(_) => "has",
            Self::DropFilter(_) => "drop_filter",
        }
    }

    pub fn filter_name(&self) -> &str {
        match self {
            Self::CreateFilter(r) | Self::DropFilter(r) => &r.name,
            Self::Add(r) | Self::Has(r) => &r.name,
        }
    }
}

/// Request plus the id used to match its response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: u64,
    pub request: Request,
}
