#![allow(dead_code)]

use async_trait::async_trait;
use diesel::result::QueryResult;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use eth_block_ingest::db::{BlockRepository, SchemaManager, SqlExecutor, SqlValue};
use eth_block_ingest::indexer::{BlockIndexer, IndexerOptions, Ticker};
use eth_block_ingest::rpc::hex;
use eth_block_ingest::rpc::{ChainReader, RpcTransport};
use eth_block_ingest::IngestError;

pub struct StubBlock {
    pub number: u64,
    pub size: u64,
    pub gas_used: u64,
    pub transactions: Vec<Value>,
}

impl StubBlock {
    pub fn new(number: u64, size: u64, gas_used: u64) -> Self {
        Self {
            number,
            size,
            gas_used,
            transactions: Vec::new(),
        }
    }

    pub fn with_transactions(mut self, transactions: Vec<Value>) -> Self {
        self.transactions = transactions;
        self
    }
}

pub fn stub_transaction(from: &str, to: Option<&str>, value: u64, nonce: u64) -> Value {
    json!({
        "gasPrice": hex::encode(20_000_000_000),
        "from": from,
        "to": to,
        "value": hex::encode(value),
        "nonce": hex::encode(nonce),
    })
}

#[derive(Default)]
struct NodeState {
    // Each poll of "latest" advances through `blocks`, repeating the last one.
    blocks: Vec<StubBlock>,
    polls: usize,
    calls: Vec<(String, Vec<Value>)>,
    per_method: HashMap<String, usize>,
    failures: HashSet<(String, usize)>,
}

/// A node that serves a scripted sequence of latest blocks.
#[derive(Clone, Default)]
pub struct StubNode {
    state: Arc<Mutex<NodeState>>,
}

impl StubNode {
    pub fn serving(blocks: Vec<StubBlock>) -> Self {
        let node = Self::default();
        node.state.lock().unwrap().blocks = blocks;
        node
    }

    /// The `nth` call (1-based) to `method` fails with a transport error.
    pub fn fail_nth(&self, method: &str, nth: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((method.to_string(), nth));
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }
}

fn find_block(blocks: &[StubBlock], number: u64) -> Option<&StubBlock> {
    blocks.iter().find(|b| b.number == number)
}

fn block_json(block: &StubBlock) -> Value {
    json!({
        "number": hex::encode(block.number),
        "size": hex::encode(block.size),
        "gasUsed": hex::encode(block.gas_used),
        "transactions": block.transactions,
    })
}

#[async_trait]
impl RpcTransport for StubNode {
    async fn call(&self, method: &str, params: Vec<Value>) -> eth_block_ingest::Result<Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((method.to_string(), params.clone()));

        let seen = state.per_method.entry(method.to_string()).or_default();
        *seen += 1;
        let nth = *seen;
        if state.failures.contains(&(method.to_string(), nth)) {
            return Err(IngestError::Transport("connection reset by peer".to_string()));
        }

        let number_param = |i: usize| params[i].as_str().and_then(|s| hex::decode(s).ok());

        let result = match method {
            "eth_getBlockByNumber" if params[0] == json!("latest") => {
                let idx = state.polls.min(state.blocks.len().saturating_sub(1));
                state.polls += 1;
                state.blocks.get(idx).map(block_json).unwrap_or(Value::Null)
            }
            "eth_getBlockByNumber" => number_param(0)
                .and_then(|n| find_block(&state.blocks, n))
                .map(block_json)
                .unwrap_or(Value::Null),
            "eth_getBlockTransactionCountByNumber" => number_param(0)
                .and_then(|n| find_block(&state.blocks, n))
                .map(|b| json!(hex::encode(b.transactions.len() as u64)))
                .unwrap_or(Value::Null),
            "eth_getTransactionByBlockNumberAndIndex" => {
                let block = number_param(0).and_then(|n| find_block(&state.blocks, n));
                let index = number_param(1);
                match (block, index) {
                    (Some(block), Some(index)) => block
                        .transactions
                        .get(index as usize)
                        .cloned()
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
            "eth_getUncleCountByBlockNumber" => json!("0x0"),
            other => {
                return Err(IngestError::Rpc {
                    code: -32601,
                    message: format!("the method {} does not exist", other),
                })
            }
        };
        Ok(result)
    }
}

#[derive(Default, Clone)]
pub struct DbState {
    pub tables: BTreeMap<String, Vec<Vec<SqlValue>>>,
    pub statements: Vec<String>,
    pub fail_on: Option<String>,
    // Failures left before `fail_on` stops matching; `None` fails forever.
    pub failures_left: Option<usize>,
    pub transactions_opened: usize,
}

/// In-memory stand-in for PostgreSQL that understands the few statement
/// shapes the repository issues.
#[derive(Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<DbState>>,
}

impl MemoryDb {
    pub fn fail_on(&self, pattern: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_on = Some(pattern.to_string());
        state.failures_left = None;
    }

    /// Fails only the first `times` statements matching `pattern`.
    pub fn fail_first(&self, pattern: &str, times: usize) {
        let mut state = self.state.lock().unwrap();
        state.fail_on = Some(pattern.to_string());
        state.failures_left = Some(times);
    }

    /// Number of `atomically` calls, committed or rolled back.
    pub fn transactions_opened(&self) -> usize {
        self.state.lock().unwrap().transactions_opened
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }
}

fn injected_failure() -> diesel::result::Error {
    diesel::result::Error::QueryBuilderError("injected failure".into())
}

fn table_after<'a>(sql: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = sql.strip_prefix(prefix)?;
    rest.split(|c: char| c.is_whitespace() || c == '(').next()
}

impl SqlExecutor for MemoryDb {
    fn execute_statement(&mut self, sql: &str, args: &[SqlValue]) -> QueryResult<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_on.as_deref().is_some_and(|p| sql.contains(p)) {
            match state.failures_left {
                Some(0) => {}
                Some(ref mut left) => {
                    *left -= 1;
                    return Err(injected_failure());
                }
                None => return Err(injected_failure()),
            }
        }
        state.statements.push(sql.to_string());

        if let Some(table) = table_after(sql, "CREATE TABLE IF NOT EXISTS ") {
            state.tables.entry(table.to_string()).or_default();
        } else if let Some(table) = table_after(sql, "INSERT INTO ") {
            let rows = state.tables.get_mut(table).ok_or_else(|| {
                diesel::result::Error::QueryBuilderError(
                    format!("relation {} does not exist", table).into(),
                )
            })?;
            // ON CONFLICT DO NOTHING keyed on the first column.
            if sql.contains("ON CONFLICT") && rows.iter().any(|row| row[0] == args[0]) {
                return Ok(0);
            }
            rows.push(args.to_vec());
        }
        Ok(1)
    }

    fn atomically<T, F>(&mut self, f: F) -> Result<T, IngestError>
    where
        F: FnOnce(&mut Self) -> Result<T, IngestError>,
    {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.transactions_opened += 1;
            state.tables.clone()
        };
        let result = f(self);
        if result.is_err() {
            self.state.lock().unwrap().tables = snapshot;
        }
        result
    }
}

#[derive(Clone, Default)]
pub struct CountingTicker {
    pub ticks: Arc<AtomicUsize>,
}

impl CountingTicker {
    pub fn count(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ticker for CountingTicker {
    async fn tick(&mut self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestIndexer = BlockIndexer<StubNode, MemoryDb, CountingTicker>;

/// Builds an indexer over an initialized in-memory database.
pub fn indexer(
    node: &StubNode,
    db: &MemoryDb,
    ticker: &CountingTicker,
    options: IndexerOptions,
) -> TestIndexer {
    let mut repo = BlockRepository::new(db.clone(), SchemaManager::new("ethereum_data").unwrap());
    repo.initialize().unwrap();
    BlockIndexer::new(ChainReader::new(node.clone()), repo, ticker.clone(), options)
}
