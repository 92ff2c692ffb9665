pub mod connection;
pub mod executor;
pub mod operations;
pub mod schema;

pub use executor::{SqlExecutor, SqlValue};
pub use operations::BlockRepository;
pub use schema::{transactions_table_name, SchemaManager};
