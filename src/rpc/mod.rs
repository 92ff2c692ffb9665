pub mod client;
pub mod hex;
pub mod reader;
pub mod types;

pub use client::{HttpRpcClient, RpcTransport};
pub use reader::ChainReader;
