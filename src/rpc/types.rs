use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::models::{BlockHeader, LatestBlock, Transaction};
use crate::rpc::hex;

/// Block object as returned by `eth_getBlockByNumber`. Quantities stay hex
/// strings until decoded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: Option<String>,
    pub size: Option<String>,
    pub gas_used: String,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// Transaction object as returned by `eth_getTransactionByBlockNumberAndIndex`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub gas_price: Option<String>,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub nonce: String,
}

pub fn block_to_header(block: &RpcBlock) -> Result<BlockHeader> {
    let number = block
        .number
        .as_deref()
        .ok_or_else(|| IngestError::Decode("block without number (pending?)".to_string()))?;
    let size = block
        .size
        .as_deref()
        .ok_or_else(|| IngestError::Decode("block without size".to_string()))?;

    Ok(BlockHeader {
        number: hex::decode(number)?,
        size: hex::decode(size)?,
        gas_used: hex::decode(&block.gas_used)?,
        observed_at: Utc::now(),
    })
}

pub fn block_to_latest(block: RpcBlock) -> Result<LatestBlock> {
    let header = block_to_header(&block)?;
    Ok(LatestBlock {
        header,
        transactions: block.transactions,
    })
}

pub fn rpc_transaction_to_transaction(
    tx: &RpcTransaction,
    block_number: u64,
    index: u32,
) -> Result<Transaction> {
    let gas_price = tx.gas_price.as_deref().map(hex::decode_u256).transpose()?;

    Ok(Transaction {
        block_number,
        index,
        gas_price,
        from: tx.from.clone(),
        to: tx.to.clone(),
        value: hex::decode_u256(&tx.value)?,
        nonce: hex::decode(&tx.nonce)?,
    })
}

/// Deserializes a non-null `result` into `T`; a null result means the node
/// does not know the requested object.
pub fn from_result<T: serde::de::DeserializeOwned>(
    result: Value,
    what: impl FnOnce() -> String,
) -> Result<T> {
    if result.is_null() {
        return Err(IngestError::NotFound(what()));
    }
    Ok(serde_json::from_value(result)?)
}
