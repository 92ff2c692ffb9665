use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::models::{BlockHeader, LatestBlock, Transaction};
use crate::rpc::client::RpcTransport;
use crate::rpc::hex;
use crate::rpc::types::{
    block_to_header, block_to_latest, from_result, rpc_transaction_to_transaction, RpcBlock,
    RpcTransaction,
};

/// Typed view of the handful of `eth_*` methods the indexer needs.
pub struct ChainReader<T> {
    transport: T,
}

impl<T: RpcTransport> ChainReader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn latest_block(&self) -> Result<LatestBlock> {
        let result = self
            .transport
            .call("eth_getBlockByNumber", vec![json!("latest"), json!(true)])
            .await?;
        let block: RpcBlock = from_result(result, || "latest block".to_string())?;
        block_to_latest(block)
    }

    pub async fn block_by_number(&self, block_number: u64) -> Result<BlockHeader> {
        let hex_number = hex::encode(block_number);
        let result = self
            .transport
            .call("eth_getBlockByNumber", vec![json!(hex_number), json!(false)])
            .await?;
        let block: RpcBlock = from_result(result, || format!("block {}", block_number))?;
        block_to_header(&block)
    }

    pub async fn transaction_count(&self, block_number: u64) -> Result<u32> {
        self.count("eth_getBlockTransactionCountByNumber", json!(hex::encode(block_number)))
            .await
    }

    pub async fn latest_transaction_count(&self) -> Result<u32> {
        self.count("eth_getBlockTransactionCountByNumber", json!("latest"))
            .await
    }

    pub async fn transaction_at(&self, block_number: u64, index: u32) -> Result<Transaction> {
        let params = vec![
            json!(hex::encode(block_number)),
            json!(hex::encode(u64::from(index))),
        ];
        let result = self
            .transport
            .call("eth_getTransactionByBlockNumberAndIndex", params)
            .await?;
        let tx: RpcTransaction = from_result(result, || {
            format!("transaction {} of block {}", index, block_number)
        })?;
        rpc_transaction_to_transaction(&tx, block_number, index)
    }

    pub async fn uncle_count(&self, block_number: u64) -> Result<u32> {
        self.count("eth_getUncleCountByBlockNumber", json!(hex::encode(block_number)))
            .await
    }

    /// Fetches headers for `start..=end` one block at a time.
    pub async fn blocks_in_range(&self, start: u64, end: u64) -> Result<Vec<BlockHeader>> {
        let mut headers = Vec::new();
        for block_number in start..=end {
            headers.push(self.block_by_number(block_number).await?);
        }
        debug!("Fetched {} headers in range {}..={}", headers.len(), start, end);
        Ok(headers)
    }

    async fn count(&self, method: &str, block: Value) -> Result<u32> {
        let what = block.to_string();
        let result = self.transport.call(method, vec![block]).await?;
        let count: String = from_result(result, || format!("{} for {}", method, what))?;
        hex::decode_u32(&count)
    }
}
