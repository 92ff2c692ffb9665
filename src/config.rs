use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::db::schema::DEFAULT_NAMESPACE;
use crate::indexer::{IndexerOptions, PersistFailurePolicy, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub database_url: String,
    pub namespace: String,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
    pub rpc_max_retries: u32,
    pub rpc_retry_base_delay: Duration,
    pub ingest_transactions: bool,
    pub skip_unchanged_blocks: bool,
    pub persist_failure_policy: PersistFailurePolicy,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} must be set", key));

        let config = Self {
            rpc_url: required("ETH_RPC_URL")?,
            database_url: required("DATABASE_URL")?,
            namespace: lookup("DB_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            poll_interval: Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", 30)?),
            rpc_timeout: Duration::from_secs(parse_or(&lookup, "RPC_TIMEOUT_SECS", 30)?),
            rpc_max_retries: parse_or(&lookup, "RPC_MAX_RETRIES", 3)?,
            rpc_retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                "RPC_RETRY_BASE_DELAY_MS",
                1000,
            )?),
            ingest_transactions: parse_or(&lookup, "INGEST_TRANSACTIONS", true)?,
            skip_unchanged_blocks: parse_or(&lookup, "SKIP_UNCHANGED_BLOCKS", true)?,
            persist_failure_policy: parse_or(
                &lookup,
                "PERSIST_FAILURE_POLICY",
                PersistFailurePolicy::Fatal,
            )?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(config)
    }

    pub fn indexer_options(&self) -> IndexerOptions {
        IndexerOptions {
            include_transactions: self.ingest_transactions,
            skip_unchanged: self.skip_unchanged_blocks,
            retry: RetryPolicy {
                max_retries: self.rpc_max_retries,
                base_delay: self.rpc_retry_base_delay,
            },
            on_persist_failure: self.persist_failure_policy,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("{} has an invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
