use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eth_block_ingest::config::Config;
use eth_block_ingest::db::connection::establish_connection;
use eth_block_ingest::db::{BlockRepository, SchemaManager};
use eth_block_ingest::indexer::{BlockIndexer, IntervalTicker};
use eth_block_ingest::rpc::{ChainReader, HttpRpcClient};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .init();

    info!("🚀 Starting eth-block-ingest");

    let rpc_client = HttpRpcClient::new(&config.rpc_url, config.rpc_timeout)
        .context("building RPC client")?;
    let schema = SchemaManager::new(&config.namespace)?;
    let conn = establish_connection(&config.database_url)?;

    let mut block_repo = BlockRepository::new(conn, schema);
    block_repo.initialize().context("preparing database schema")?;

    let mut indexer = BlockIndexer::new(
        ChainReader::new(rpc_client),
        block_repo,
        IntervalTicker::new(config.poll_interval),
        config.indexer_options(),
    );

    let outcome = tokio::select! {
        result = indexer.run() => result,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    let conn = indexer.into_repository().into_executor();
    drop(conn);
    info!("Database connection released");

    outcome.context("block indexer stopped")
}
