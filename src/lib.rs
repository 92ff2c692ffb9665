pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod models;
pub mod rpc;

pub use error::{IngestError, Result};
