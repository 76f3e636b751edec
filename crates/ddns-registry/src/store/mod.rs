// # Store Implementations
//
// This module provides implementations of the StoreGateway trait.

pub mod sqlite;

pub use sqlite::SqliteStore;
