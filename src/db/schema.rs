use tracing::{debug, info};

use crate::db::executor::SqlExecutor;
use crate::error::{IngestError, Result};

pub const DEFAULT_NAMESPACE: &str = "ethereum_data";

/// Name of the generated table holding one block's transactions.
pub fn transactions_table_name(block_number: u64) -> String {
    format!("block_{}_transactions", block_number)
}

/// Creates the namespace, the `blocks` table and the per-block transaction
/// tables. Every statement is `IF NOT EXISTS`, so callers never need to
/// remember what already exists.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    namespace: String,
}

impl SchemaManager {
    pub fn new(namespace: &str) -> Result<Self> {
        if !is_plain_identifier(namespace) {
            return Err(IngestError::Schema(format!(
                "invalid namespace {:?}: expected [a-z_][a-z0-9_]*",
                namespace
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
        })
    }

    pub fn blocks_table(&self) -> String {
        format!("{}.blocks", self.namespace)
    }

    pub fn transactions_table(&self, block_number: u64) -> String {
        format!("{}.{}", self.namespace, transactions_table_name(block_number))
    }

    pub fn ensure_database<E: SqlExecutor>(&self, conn: &mut E) -> Result<()> {
        run_ddl(conn, &format!("CREATE SCHEMA IF NOT EXISTS {}", self.namespace))?;
        run_ddl(conn, &format!("SET search_path TO {}", self.namespace))?;
        info!("Using schema {}", self.namespace);
        Ok(())
    }

    pub fn ensure_blocks_table<E: SqlExecutor>(&self, conn: &mut E) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                block_number BIGINT NOT NULL,
                block_size BIGINT,
                total_gas_used BIGINT,
                transaction_count INTEGER,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            self.blocks_table()
        );
        run_ddl(conn, &sql)?;
        info!("Table {} ready", self.blocks_table());
        Ok(())
    }

    pub fn ensure_transactions_table<E: SqlExecutor>(
        &self,
        conn: &mut E,
        block_number: u64,
    ) -> Result<()> {
        // Gas price and value are 256-bit quantities, kept as decimal text.
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                transaction_index INTEGER PRIMARY KEY,
                gas_price TEXT,
                from_address TEXT NOT NULL,
                to_address TEXT,
                value TEXT NOT NULL,
                nonce BIGINT NOT NULL
            )",
            self.transactions_table(block_number)
        );
        run_ddl(conn, &sql)?;
        debug!("Table {} ready", self.transactions_table(block_number));
        Ok(())
    }
}

fn run_ddl<E: SqlExecutor>(conn: &mut E, sql: &str) -> Result<()> {
    conn.execute_statement(sql, &[])
        .map_err(|e| IngestError::Schema(e.to_string()))?;
    Ok(())
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    starts_ok
        && name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
