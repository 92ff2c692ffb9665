use diesel::pg::PgConnection;
use diesel::Connection;
use tracing::info;

use crate::error::{IngestError, Result};

/// Opens the single connection the indexer writes through.
pub fn establish_connection(database_url: &str) -> Result<PgConnection> {
    let conn = PgConnection::establish(database_url)
        .map_err(|e| IngestError::Persistence(format!("cannot connect to database: {}", e)))?;
    info!("Connected to PostgreSQL");
    Ok(conn)
}
