pub mod block;
pub mod transaction;

pub use block::{Block, BlockHeader, LatestBlock};
pub use transaction::Transaction;
