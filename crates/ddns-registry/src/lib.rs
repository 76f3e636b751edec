// # ddns-registry
//
// Local provider registry service for the goDDNS companion application.
//
// ## Architecture Overview
//
// This library keeps a small catalog of DDNS providers and serves it over
// local IPC and, optionally, loopback TCP:
// - **StoreGateway**: Trait for the embedded SQL store (one connection per call)
// - **SqliteStore**: The sqlite-backed gateway
// - **ProviderCache**: In-memory snapshot of all provider records
// - **api**: HTTP routes shared by every listener
// - **transport**: Named pipe / unix socket / TCP listeners
// - **RegistryService**: Startup ordering and bounded graceful shutdown
//
// ## Design Principles
//
// 1. **Store is the source of truth**: the cache is rebuilt from it, never edited
// 2. **One contract**: every listener serves the same router
// 3. **Library-First**: the daemon is a thin wrapper around this crate

pub mod api;
pub mod cache;
pub mod companion;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod records;
pub mod store;
pub mod traits;
pub mod transport;

// Re-export core types for convenience
pub use cache::ProviderCache;
pub use companion::CompanionLauncher;
pub use config::{CompanionConfig, ServiceConfig, TransportConfig};
pub use error::{Error, Result};
pub use identity::ServiceIdentity;
pub use lifecycle::{RegistryService, RunningService};
pub use records::{NewProvider, ProviderRecord};
pub use store::SqliteStore;
pub use traits::StoreGateway;
pub use transport::{Endpoint, ListenerState};
