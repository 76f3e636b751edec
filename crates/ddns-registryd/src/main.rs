// # ddns-registryd - Provider Registry Daemon
//
// Thin integration layer: all registry logic lives in ddns-registry.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Opening the store and starting the registry service
// 4. Shutting down on SIGINT/SIGTERM
//
// ## Configuration
//
// - `DDNS_DATABASE_PATH`: sqlite database (default `config.db`)
// - `DDNS_SOCKET_PATH`: filesystem socket on non-Windows hosts
// - `DDNS_PIPE_NAME`: named pipe on Windows
// - `DDNS_TCP_ADDR`: loopback TCP address, used when `RUN_REST_SERVER` is `YES`
// - `DDNS_COMPANION_DIR`, `DDNS_COMPANION_PROGRAM`, `DDNS_COMPANION_ENABLED`
// - `DDNS_FAVICON_PATH`: icon served at `/favicon.ico`
// - `DDNS_SHUTDOWN_GRACE_SECS`: grace period for in-flight requests (1-300)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export DDNS_DATABASE_PATH=/var/lib/goddns/config.db
// export DDNS_COMPANION_ENABLED=false
//
// ddns-registryd
// ```

use anyhow::Result;
use ddns_registry::{Error, RegistryService, RunningService, ServiceConfig, SqliteStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, including a shutdown that overran its grace period
#[derive(Debug, Clone, Copy)]
enum RegistryExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<RegistryExitCode> for ExitCode {
    fn from(code: RegistryExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return RegistryExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return RegistryExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return RegistryExitCode::ConfigError.into();
    }

    info!("Starting ddns-registryd");
    info!("Database: {}", config.database_path.display());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return RegistryExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let service = match start_service(config).await {
            Ok(service) => service,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return RegistryExitCode::ConfigError;
            }
        };

        match service.run_until_signal().await {
            Ok(()) => RegistryExitCode::CleanShutdown,
            Err(e @ Error::ShutdownTimeout { .. }) => {
                error!("{}", e);
                RegistryExitCode::RuntimeError
            }
            Err(e) => {
                error!("Daemon error: {}", e);
                RegistryExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Open the store and run the startup sequence
async fn start_service(config: ServiceConfig) -> Result<RunningService> {
    let store = Arc::new(SqliteStore::new(&config.database_path));
    store.initialize_schema().await?;

    let service = RegistryService::new(config, store).start().await?;

    for listener in service.listeners() {
        info!("Listening on {}", listener.endpoint());
    }
    info!("Daemon initialized successfully");

    Ok(service)
}
