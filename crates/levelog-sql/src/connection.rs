//! SQLite connection that reports every statement to a [`QueryLogger`]

use rusqlite::{Connection, Params, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use levelog_core::LogContext;

use crate::contract::QueryLogger;
use crate::error::QueryError;

/// A `rusqlite` connection whose statements are traced.
pub struct TracedConnection {
    conn: Connection,
    logger: Arc<dyn QueryLogger>,
}

impl TracedConnection {
    pub fn new(conn: Connection, logger: Arc<dyn QueryLogger>) -> Self {
        Self { conn, logger }
    }

    /// Open a database at the given path, creating it if needed.
    pub fn open(path: &Path, logger: Arc<dyn QueryLogger>) -> Result<Self, QueryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QueryError::Other(format!("failed to create database directory {:?}: {}", parent, e))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!("Opened database at {:?}", path);

        Ok(Self::new(conn, logger))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(logger: Arc<dyn QueryLogger>) -> Result<Self, QueryError> {
        let conn = Connection::open_in_memory()?;
        debug!("Opened in-memory database");
        Ok(Self::new(conn, logger))
    }

    pub fn logger(&self) -> &Arc<dyn QueryLogger> {
        &self.logger
    }

    /// The untraced connection.
    pub fn inner(&self) -> &Connection {
        &self.conn
    }

    /// Run one statement; returns the number of changed rows.
    pub fn execute<P: Params>(&self, ctx: &LogContext, sql: &str, params: P) -> Result<usize, QueryError> {
        let begin = Instant::now();
        let result = self.conn.execute(sql, params).map_err(QueryError::from);

        let rows = result.as_ref().map(|n| *n as i64).unwrap_or(0);
        self.trace(ctx, begin, sql, rows, result.as_ref().err());
        result
    }

    /// Run a query expected to return one row.
    ///
    /// No row is reported as [`QueryError::RecordNotFound`].
    pub fn query_row<T, P, F>(&self, ctx: &LogContext, sql: &str, params: P, f: F) -> Result<T, QueryError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let begin = Instant::now();
        let result = self.conn.query_row(sql, params, f).map_err(QueryError::from);

        let rows = if result.is_ok() { 1 } else { 0 };
        self.trace(ctx, begin, sql, rows, result.as_ref().err());
        result
    }

    /// Run a query and map every row.
    pub fn query_map<T, P, F>(&self, ctx: &LogContext, sql: &str, params: P, f: F) -> Result<Vec<T>, QueryError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let begin = Instant::now();
        let result = collect_rows(&self.conn, sql, params, f).map_err(QueryError::from);

        let rows = result.as_ref().map(|r| r.len() as i64).unwrap_or(0);
        self.trace(ctx, begin, sql, rows, result.as_ref().err());
        result
    }

    /// Run several `;`-separated statements. Reported with a row count of 0.
    pub fn execute_batch(&self, ctx: &LogContext, sql: &str) -> Result<(), QueryError> {
        let begin = Instant::now();
        let result = self.conn.execute_batch(sql).map_err(QueryError::from);

        self.trace(ctx, begin, sql, 0, result.as_ref().err());
        result
    }

    fn trace(&self, ctx: &LogContext, begin: Instant, sql: &str, rows: i64, err: Option<&QueryError>) {
        self.logger
            .trace(ctx, begin, &|| (sql.to_string(), rows), err);
    }
}

fn collect_rows<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> rusqlite::Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    rows.collect()
}
