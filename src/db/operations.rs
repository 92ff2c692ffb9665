use tracing::info;

use crate::db::executor::{SqlExecutor, SqlValue};
use crate::db::schema::SchemaManager;
use crate::error::{IngestError, Result};
use crate::models::{Block, Transaction};

/// Writes block summaries and their transactions. Owns the connection for
/// the lifetime of the process.
pub struct BlockRepository<E> {
    conn: E,
    schema: SchemaManager,
}

impl<E: SqlExecutor> BlockRepository<E> {
    pub fn new(conn: E, schema: SchemaManager) -> Self {
        Self { conn, schema }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.schema.ensure_database(&mut self.conn)?;
        self.schema.ensure_blocks_table(&mut self.conn)
    }

    pub fn ensure_transactions_table(&mut self, block_number: u64) -> Result<()> {
        self.schema.ensure_transactions_table(&mut self.conn, block_number)
    }

    pub fn store_block(&mut self, block: &Block) -> Result<()> {
        insert_block(&mut self.conn, &self.schema, block)
    }

    /// Returns false when a row with the same index was already stored.
    pub fn store_transaction(&mut self, block_number: u64, tx: &Transaction) -> Result<bool> {
        let inserted = insert_transaction(&mut self.conn, &self.schema, block_number, tx)?;
        Ok(inserted > 0)
    }

    /// Stores the block row and all its transaction rows in one database
    /// transaction. With `create_table` the per-block table is created in
    /// the same transaction first.
    ///
    /// Returns the number of transaction rows actually inserted, which is
    /// lower than `transactions.len()` when the block was stored before.
    pub fn store_block_with_transactions(
        &mut self,
        block: &Block,
        transactions: &[Transaction],
        create_table: bool,
    ) -> Result<usize> {
        let schema = &self.schema;
        let inserted = self.conn.atomically(|conn| {
            if create_table {
                schema.ensure_transactions_table(conn, block.number)?;
            }
            insert_block(conn, schema, block)?;
            let mut inserted = 0;
            for tx in transactions {
                inserted += insert_transaction(conn, schema, block.number, tx)?;
            }
            Ok(inserted)
        })?;

        info!(
            "✅ Block {} stored with {} transactions",
            block.number, inserted
        );
        Ok(inserted)
    }

    /// Gives the connection back so the caller decides when it is released.
    pub fn into_executor(self) -> E {
        self.conn
    }
}

fn insert_block<E: SqlExecutor>(conn: &mut E, schema: &SchemaManager, block: &Block) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (block_number, block_size, total_gas_used, transaction_count) \
         VALUES ($1, $2, $3, $4)",
        schema.blocks_table()
    );
    let args = [
        SqlValue::BigInt(to_bigint(block.number, "block number")?),
        SqlValue::BigInt(to_bigint(block.size, "block size")?),
        SqlValue::BigInt(to_bigint(block.gas_used, "gas used")?),
        SqlValue::Int(to_int(block.transaction_count)?),
    ];
    conn.execute_statement(&sql, &args)
        .map_err(|e| IngestError::Persistence(format!("block {}: {}", block.number, e)))?;
    Ok(())
}

fn insert_transaction<E: SqlExecutor>(
    conn: &mut E,
    schema: &SchemaManager,
    block_number: u64,
    tx: &Transaction,
) -> Result<usize> {
    let sql = format!(
        "INSERT INTO {} (transaction_index, gas_price, from_address, to_address, value, nonce) \
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (transaction_index) DO NOTHING",
        schema.transactions_table(block_number)
    );
    let args = [
        SqlValue::Int(to_int(tx.index)?),
        tx.gas_price.map(|price| price.to_string()).into(),
        SqlValue::Text(tx.from.clone()),
        tx.to.clone().into(),
        SqlValue::Text(tx.value.to_string()),
        SqlValue::BigInt(to_bigint(tx.nonce, "nonce")?),
    ];
    conn.execute_statement(&sql, &args).map_err(|e| {
        IngestError::Persistence(format!(
            "transaction {} of block {}: {}",
            tx.index, block_number, e
        ))
    })
}

fn to_bigint(value: u64, what: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| IngestError::Persistence(format!("{} {} exceeds BIGINT", what, value)))
}

fn to_int(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| IngestError::Persistence(format!("{} exceeds INTEGER", value)))
}
