use async_trait::async_trait;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::db::executor::SqlExecutor;
use crate::db::operations::BlockRepository;
use crate::error::Result;
use crate::models::{Block, Transaction};
use crate::rpc::client::RpcTransport;
use crate::rpc::reader::ChainReader;

/// Where the indexer is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    Polling,
    FetchingDetail,
    Persisting,
    Sleeping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Stored { number: u64, transactions: usize },
    /// The latest block is the one stored by the previous cycle.
    Unchanged { number: u64 },
    /// Persisting failed and the failure policy chose to move on.
    Skipped { number: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Exponential backoff: base, 2*base, 4*base...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistFailurePolicy {
    Fatal,
    Skip,
    Retry(u32),
}

impl FromStr for PersistFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fatal" => Ok(Self::Fatal),
            "skip" => Ok(Self::Skip),
            _ => s
                .strip_prefix("retry:")
                .and_then(|n| n.parse().ok())
                .map(Self::Retry)
                .ok_or_else(|| format!("expected fatal, skip or retry:<n>, got {:?}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexerOptions {
    pub include_transactions: bool,
    pub skip_unchanged: bool,
    pub retry: RetryPolicy,
    pub on_persist_failure: PersistFailurePolicy,
}

/// Transactions are included and an unchanged latest block is skipped, as
/// with [`crate::config::Config`]'s defaults. RPC errors are not retried.
impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            include_transactions: true,
            skip_unchanged: true,
            retry: RetryPolicy::none(),
            on_persist_failure: PersistFailurePolicy::Fatal,
        }
    }
}

/// Paces the indexer between cycles.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

pub struct IntervalTicker {
    interval: Duration,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        sleep(self.interval).await;
    }
}

pub struct BlockIndexer<T, E, K> {
    reader: ChainReader<T>,
    block_repo: BlockRepository<E>,
    ticker: K,
    options: IndexerOptions,
    state: IndexerState,
    last_stored: Option<u64>,
}

impl<T, E, K> BlockIndexer<T, E, K>
where
    T: RpcTransport,
    E: SqlExecutor,
    K: Ticker,
{
    pub fn new(
        reader: ChainReader<T>,
        block_repo: BlockRepository<E>,
        ticker: K,
        options: IndexerOptions,
    ) -> Self {
        Self {
            reader,
            block_repo,
            ticker,
            options,
            state: IndexerState::Polling,
            last_stored: None,
        }
    }

    pub fn state(&self) -> IndexerState {
        self.state
    }

    pub fn last_stored(&self) -> Option<u64> {
        self.last_stored
    }

    /// Polls, stores and sleeps until a cycle fails in a way the configured
    /// policies do not absorb.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting block indexer...");

        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Stored { number, transactions }) => {
                    info!("📦 Block #{} indexed ({} transactions)", number, transactions);
                }
                Ok(CycleOutcome::Unchanged { number }) => {
                    debug!("Latest block still #{}, nothing to store", number);
                }
                Ok(CycleOutcome::Skipped { number }) => {
                    warn!("Block #{} skipped after persistence failure", number);
                }
                Err(e) => {
                    error!("❌ Indexing cycle failed: {}", e);
                    return Err(e);
                }
            }

            self.state = IndexerState::Sleeping;
            self.ticker.tick().await;
        }
    }

    /// One pass through polling, fetching and persisting.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.state = IndexerState::Polling;
        let reader = &self.reader;
        let retry = self.options.retry;

        let latest = with_retry(&retry, "latest block", move || reader.latest_block()).await?;
        let number = latest.header.number;
        info!("Current latest block: #{}", number);

        if self.options.skip_unchanged && self.last_stored == Some(number) {
            return Ok(CycleOutcome::Unchanged { number });
        }

        self.state = IndexerState::FetchingDetail;
        let count = with_retry(&retry, "transaction count", move || {
            reader.transaction_count(number)
        })
        .await?;
        info!("Transaction count of block #{}: {}", number, count);

        if latest.transactions.len() != count as usize {
            warn!(
                "Block #{} listed {} transactions but the node counts {}",
                number,
                latest.transactions.len(),
                count
            );
        }

        let mut transactions: Vec<Transaction> = Vec::new();
        if self.options.include_transactions {
            transactions.reserve(count as usize);
            for index in 0..count {
                let tx = with_retry(&retry, "transaction", move || {
                    reader.transaction_at(number, index)
                })
                .await?;
                if tx.is_contract_creation() {
                    debug!("Transaction {} of block #{} creates a contract", index, number);
                }
                transactions.push(tx);
            }
        }

        self.state = IndexerState::Persisting;
        let block = Block::from_header(latest.header, count);
        match self.persist(&block, &transactions).await {
            Ok(stored) => {
                self.last_stored = Some(number);
                Ok(CycleOutcome::Stored {
                    number,
                    transactions: stored,
                })
            }
            Err(e)
                if self.options.on_persist_failure == PersistFailurePolicy::Skip
                    && e.is_storage() =>
            {
                warn!("⚠️ Skipping block #{}: {}", number, e);
                Ok(CycleOutcome::Skipped { number })
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&mut self, block: &Block, transactions: &[Transaction]) -> Result<usize> {
        let attempts = match self.options.on_persist_failure {
            PersistFailurePolicy::Retry(n) => n,
            _ => 0,
        };
        let create_table = self.options.include_transactions;

        let mut attempt = 0;
        loop {
            match self
                .block_repo
                .store_block_with_transactions(block, transactions, create_table)
            {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_storage() && attempt < attempts => {
                    attempt += 1;
                    warn!(
                        "🔄 Storing block #{} failed (attempt {}/{}): {}",
                        block.number, attempt, attempts, e
                    );
                    sleep(self.options.retry.delay_for(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Hands back the repository, and with it the database connection.
    pub fn into_repository(self) -> BlockRepository<E> {
        self.block_repo
    }
}

async fn with_retry<F, Fut, R>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<R>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "🔄 Fetching {} failed (attempt {}/{}), retrying in {:?}: {}",
                    what, attempt, policy.max_retries, delay, e
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
