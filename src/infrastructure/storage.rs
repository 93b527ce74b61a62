use crate::infrastructure::error::TrackerError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Foreign keys are per-connection in SQLite, so every connection turns them
/// on before use.
pub fn open_connection(path: &Path) -> Result<Connection, TrackerError> {
    let connection = Connection::open(path)?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    Ok(connection)
}

pub fn initialize_database(path: &Path) -> Result<(), TrackerError> {
    let connection = open_connection(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
