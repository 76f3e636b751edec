//! Core traits for the registry service
//!
//! This module defines the abstract interfaces the rest of the crate is built on.
//!
//! - [`StoreGateway`]: Parameterized query/execute access to the durable store

pub mod store_gateway;

pub use store_gateway::{Row, StoreGateway, Value};
