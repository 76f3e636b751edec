//! Lifecycle controller
//!
//! Orchestrates startup and shutdown of the registry service.
//!
//! ## Startup Order
//!
//! 1. Rebuild the provider cache from the store
//! 2. Remove a stale local channel artifact (socket file)
//! 3. Launch the companion application
//! 4. Bind and serve the local channel
//! 5. If the store enables it, bind and serve the loopback TCP listener
//!
//! Any failure in these steps is fatal: the service cannot do its job without
//! a valid cache and its listeners.
//!
//! ## Shutdown
//!
//! On the first termination signal every listener stops accepting and in-flight
//! requests get a fixed grace period. Listeners still open after that are
//! aborted and reported. A second signal during the grace period aborts
//! immediately.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{self, AppState};
use crate::cache::ProviderCache;
use crate::companion::CompanionLauncher;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::identity::ServiceIdentity;
use crate::records;
use crate::traits::StoreGateway;
use crate::transport::{self, Endpoint, ListenerHandle};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Registry service, not started yet
pub struct RegistryService {
    config: ServiceConfig,
    store: Arc<dyn StoreGateway>,
    identity: Option<ServiceIdentity>,
}

impl RegistryService {
    /// Create a service over `store`
    pub fn new(config: ServiceConfig, store: Arc<dyn StoreGateway>) -> Self {
        Self {
            config,
            store,
            identity: None,
        }
    }

    /// Use a fixed identity instead of detecting the machine id
    pub fn with_identity(mut self, identity: ServiceIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Run the startup sequence and start serving
    pub async fn start(self) -> Result<RunningService> {
        let identity = self.identity.unwrap_or_else(ServiceIdentity::detect);

        let cache = Arc::new(ProviderCache::new(Arc::clone(&self.store)));
        let count = cache.rebuild().await?;
        info!("Provider cache warmed: {} provider(s)", count);

        let local = Endpoint::local(&self.config.transport);
        transport::remove_stale_artifact(&local)?;

        let companion = Arc::new(CompanionLauncher::from_config(&self.config.companion));
        companion.launch_best_effort().await;

        let state = AppState::new(
            Arc::clone(&self.store),
            Arc::clone(&cache),
            identity,
            companion,
        );
        let router = api::router(state, &self.config.favicon_path);
        let cancel = CancellationToken::new();

        let mut running = RunningService {
            cache,
            listeners: Vec::new(),
            cancel: cancel.clone(),
            grace: self.config.shutdown_grace(),
        };

        let bound = transport::bind(&local).await?;
        let endpoint = bound.local_endpoint(&local);
        running
            .listeners
            .push(transport::serve(endpoint, bound, router.clone(), cancel.clone()));

        if let Err(e) = running.start_network_listener(&self.config, self.store.as_ref(), router).await {
            running.abort();
            return Err(e);
        }

        info!("Registry service started with {} listener(s)", running.listeners.len());
        Ok(running)
    }
}

/// A started registry service
pub struct RunningService {
    cache: Arc<ProviderCache>,
    listeners: Vec<ListenerHandle>,
    cancel: CancellationToken,
    grace: Duration,
}

impl RunningService {
    async fn start_network_listener(
        &mut self,
        config: &ServiceConfig,
        store: &dyn StoreGateway,
        router: axum::Router,
    ) -> Result<()> {
        if !records::run_network_listener(store).await? {
            info!("Network listener disabled");
            return Ok(());
        }

        let requested = Endpoint::network(&config.transport);
        let bound = transport::bind(&requested).await?;
        let endpoint = bound.local_endpoint(&requested);
        self.listeners
            .push(transport::serve(endpoint, bound, router, self.cancel.clone()));

        Ok(())
    }

    /// Handles of every bound listener, local channel first
    pub fn listeners(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// Address of the loopback TCP listener, if it was started
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.listeners.iter().find_map(|listener| match listener.endpoint() {
            Endpoint::Tcp(addr) => Some(*addr),
            #[allow(unreachable_patterns)]
            _ => None,
        })
    }

    /// The shared provider cache
    pub fn cache(&self) -> &Arc<ProviderCache> {
        &self.cache
    }

    /// Shutdown grace period
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Stop every listener without waiting
    pub fn abort(&self) {
        self.cancel.cancel();
        for listener in &self.listeners {
            listener.abort();
        }
    }

    /// Stop accepting and wait up to the grace period for in-flight requests
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_or_force(std::future::pending()).await
    }

    /// Like [`shutdown`](Self::shutdown), but abort at once if `force` completes first
    pub async fn shutdown_or_force<F>(mut self, force: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Shutting down {} listener(s)", self.listeners.len());
        self.cancel.cancel();

        match drain(&mut self.listeners, self.grace, force).await {
            Drain::Complete => {
                info!("Registry service stopped");
                Ok(())
            }
            Drain::Forced => {
                warn!("Forced shutdown, in-flight requests dropped");
                Ok(())
            }
            Drain::TimedOut(pending) => Err(Error::ShutdownTimeout {
                grace: self.grace,
                pending,
            }),
        }
    }

    /// Block until SIGINT/SIGTERM, then shut down
    ///
    /// A second signal during the grace period forces the shutdown.
    pub async fn run_until_signal(self) -> Result<()> {
        let received = wait_for_signal().await?;
        info!("Received shutdown signal: {}", received);
        info!("shutting down gracefully, press Ctrl+C again to force");

        self.shutdown_or_force(async {
            if let Ok(again) = wait_for_signal().await {
                warn!("Received second signal: {}", again);
            }
        })
        .await
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Drain {
    Complete,
    Forced,
    TimedOut(usize),
}

// Listeners must already be cancelled.
async fn drain<F>(listeners: &mut [ListenerHandle], grace: Duration, force: F) -> Drain
where
    F: Future<Output = ()>,
{
    let outcome = {
        let wait_all = async {
            for listener in listeners.iter_mut() {
                if let Err(e) = listener.wait().await {
                    error!(listener = %listener.endpoint(), "Listener failed: {}", e);
                }
            }
        };

        tokio::select! {
            finished = tokio::time::timeout(grace, wait_all) => {
                if finished.is_ok() { Drain::Complete } else { Drain::TimedOut(0) }
            }
            _ = force => Drain::Forced,
        }
    };

    match outcome {
        Drain::Complete => Drain::Complete,
        Drain::Forced => {
            listeners.iter().for_each(ListenerHandle::abort);
            Drain::Forced
        }
        Drain::TimedOut(_) => {
            let pending = listeners.iter().filter(|l| !l.is_finished()).count();
            for listener in listeners.iter().filter(|l| !l.is_finished()) {
                error!(listener = %listener.endpoint(), "Listener did not close within {:?}", grace);
                listener.abort();
            }
            Drain::TimedOut(pending)
        }
    }
}

/// Wait for a termination signal (SIGTERM, SIGINT)
///
/// # Returns
///
/// The name of the signal received.
#[cfg(unix)]
pub async fn wait_for_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::config(format!("Failed to setup SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::config(format!("Failed to setup SIGINT handler: {}", e)))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::config(format!("Failed to wait for CTRL-C: {}", e)))?;
    Ok("SIGINT")
}
