use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub size: u64,
    pub gas_used: u64,
    pub observed_at: DateTime<Utc>,
}

/// A block summary as stored in the `blocks` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub size: u64,
    pub gas_used: u64,
    pub transaction_count: u32,
    pub observed_at: DateTime<Utc>,
}

impl Block {
    pub fn from_header(header: BlockHeader, transaction_count: u32) -> Self {
        Self {
            number: header.number,
            size: header.size,
            gas_used: header.gas_used,
            transaction_count,
            observed_at: header.observed_at,
        }
    }
}

/// The latest block together with the full transaction objects the node
/// returned alongside it, left undecoded.
#[derive(Debug, Clone)]
pub struct LatestBlock {
    pub header: BlockHeader,
    pub transactions: Vec<Value>,
}
