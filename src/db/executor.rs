use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::result::QueryResult;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};

use crate::error::IngestError;

/// A positional bind parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    BigInt(i64),
    Int(i32),
    Text(String),
    Null,
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

/// The statement-level seam the schema and persistence code runs against.
pub trait SqlExecutor {
    /// Runs one statement with `$n` placeholders bound to `args`, returning
    /// the affected row count.
    fn execute_statement(&mut self, sql: &str, args: &[SqlValue]) -> QueryResult<usize>;

    /// Runs `f` inside a database transaction; an `Err` rolls back every
    /// statement `f` issued.
    fn atomically<T, F>(&mut self, f: F) -> Result<T, IngestError>
    where
        F: FnOnce(&mut Self) -> Result<T, IngestError>;
}

impl SqlExecutor for PgConnection {
    fn execute_statement(&mut self, sql: &str, args: &[SqlValue]) -> QueryResult<usize> {
        let mut query = diesel::sql_query(sql).into_boxed::<Pg>();
        for arg in args {
            query = match arg {
                SqlValue::BigInt(v) => query.bind::<BigInt, _>(*v),
                SqlValue::Int(v) => query.bind::<Integer, _>(*v),
                SqlValue::Text(v) => query.bind::<Text, _>(v.clone()),
                SqlValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            };
        }
        query.execute(self)
    }

    fn atomically<T, F>(&mut self, f: F) -> Result<T, IngestError>
    where
        F: FnOnce(&mut Self) -> Result<T, IngestError>,
    {
        Connection::transaction(self, f)
    }
}
