// # Store Gateway Trait
//
// Defines the boundary between the service and its durable record store.
//
// ## Purpose
//
// Every component that needs persisted data goes through this trait:
// - The provider cache rebuilds its snapshot from it
// - The API reads the selected provider(s) and inserts new providers
// - The lifecycle controller reads the network listener flag
//
// ## Handle Scoping
//
// Implementations must acquire a store handle per call and release it on every
// exit path. No connection outlives a single `query` or `execute`.
//
// ## Usage
//
// ```rust,ignore
// use ddns_registry::traits::{StoreGateway, Value};
//
// let rows = store
//     .query("SELECT NAME, VALUE FROM CONFIG WHERE NAME = ?1", vec![Value::from("RUN_REST_SERVER".to_string())])
//     .await?;
// ```

use async_trait::async_trait;

pub use rusqlite::types::Value;

/// A single result row, columns in statement order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<Value>,
}

impl Row {
    /// Create a row from its column values
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw column value
    pub fn value(&self, idx: usize) -> Result<&Value, crate::Error> {
        self.columns
            .get(idx)
            .ok_or_else(|| crate::Error::store(format!("column {} out of range", idx)))
    }

    /// Text column; NULL reads as an empty string
    pub fn text(&self, idx: usize) -> Result<String, crate::Error> {
        match self.value(idx)? {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => Err(crate::Error::store(format!(
                "column {} is not text: {:?}",
                idx, other
            ))),
        }
    }

    /// Integer column interpreted as a flag (non-zero is true, NULL is false)
    pub fn flag(&self, idx: usize) -> Result<bool, crate::Error> {
        match self.value(idx)? {
            Value::Integer(n) => Ok(*n != 0),
            Value::Null => Ok(false),
            other => Err(crate::Error::store(format!(
                "column {} is not an integer flag: {:?}",
                idx, other
            ))),
        }
    }
}

/// Trait for durable store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// Calls may block on IO internally but must not block the async executor.
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Run a read statement with positional parameters
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Row>)`: All result rows (possibly empty)
    /// - `Err(Error::Store)`: Open, prepare, read or close failure
    async fn query(&self, statement: &str, params: Vec<Value>) -> Result<Vec<Row>, crate::Error>;

    /// Run a write statement with positional parameters
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of affected rows
    /// - `Err(Error::Store)`: Open, write or close failure
    async fn execute(&self, statement: &str, params: Vec<Value>) -> Result<usize, crate::Error>;
}
