use ethers::types::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub block_number: u64,
    pub index: u32,
    pub gas_price: Option<U256>,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,
    pub nonce: u64,
}

impl Transaction {
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}
