// # SQLite Store
//
// SQLite-backed implementation of StoreGateway.
//
// ## Handle Lifecycle
//
// - A connection is opened at the start of every `query`/`execute`
// - The connection is closed explicitly before the call returns, on success
//   and on failure alike; close failures surface as store errors
// - All blocking work runs on the blocking thread pool
//
// ## Schema
//
// ```sql
// CREATE TABLE PROVIDERS (ID TEXT PRIMARY KEY, NAME TEXT NOT NULL,
//                         ADDRESS TEXT NOT NULL, SELECTED INTEGER NOT NULL DEFAULT 0);
// CREATE TABLE CONFIG (NAME TEXT PRIMARY KEY, VALUE TEXT NOT NULL);
// ```

use async_trait::async_trait;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Error;
use crate::traits::store_gateway::{Row, StoreGateway, Value};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS PROVIDERS (
    ID TEXT PRIMARY KEY,
    NAME TEXT NOT NULL,
    ADDRESS TEXT NOT NULL,
    SELECTED INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS CONFIG (
    NAME TEXT PRIMARY KEY,
    VALUE TEXT NOT NULL
);
"#;

/// SQLite store gateway
///
/// Holds only the database path; connections are scoped to single calls.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_registry::store::SqliteStore;
/// use ddns_registry::traits::StoreGateway;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::new("config.db");
///     store.initialize_schema().await?;
///
///     let rows = store.query("SELECT ID FROM PROVIDERS", Vec::new()).await?;
///     println!("{} provider(s)", rows.len());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Create a gateway for the database file at `path`
    ///
    /// Nothing is opened until the first call.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the PROVIDERS and CONFIG tables if they do not exist yet
    pub async fn initialize_schema(&self) -> Result<(), Error> {
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_handle(&path)?;
            let result = conn.execute_batch(SCHEMA).map_err(Error::from);
            let closed = close_handle(conn);
            result?;
            closed
        })
        .await?
    }
}

#[async_trait]
impl StoreGateway for SqliteStore {
    async fn query(&self, statement: &str, params: Vec<Value>) -> Result<Vec<Row>, Error> {
        let path = self.path.clone();
        let statement = statement.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_handle(&path)?;
            let result = read_rows(&conn, &statement, &params);
            let closed = close_handle(conn);
            let rows = result?;
            closed?;
            Ok(rows)
        })
        .await?
    }

    async fn execute(&self, statement: &str, params: Vec<Value>) -> Result<usize, Error> {
        let path = self.path.clone();
        let statement = statement.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_handle(&path)?;
            let result = conn
                .execute(&statement, rusqlite::params_from_iter(params.iter()))
                .map_err(Error::from);
            let closed = close_handle(conn);
            let affected = result?;
            closed?;
            debug!("Rows affected: {}", affected);
            Ok(affected)
        })
        .await?
    }
}

fn open_handle(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path).map_err(|e| {
        Error::store(format!("Failed to open database {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "DB opened");
    Ok(conn)
}

fn close_handle(conn: Connection) -> Result<(), Error> {
    conn.close()
        .map_err(|(_, e)| Error::store(format!("Failed to close database: {}", e)))?;
    debug!("DB closed");
    Ok(())
}

fn read_rows(conn: &Connection, statement: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(statement)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            columns.push(row.get::<_, Value>(idx)?);
        }
        out.push(Row::new(columns));
    }

    Ok(out)
}
