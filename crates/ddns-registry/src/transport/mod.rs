//! Transport manager
//!
//! Binds the listeners the service is reachable on and serves the shared
//! router on each of them in its own task.
//!
//! ## Listeners
//!
//! - **Local channel**: a named pipe on Windows, a filesystem socket elsewhere.
//!   Chosen once by [`Endpoint::local`]; always bound.
//! - **Loopback TCP**: [`Endpoint::network`]; bound only when the store says so.
//!
//! ## Listener States
//!
//! ```text
//! Unbound ── bind() ──▶ Bound ── serve() ──▶ Serving ── cancel ──▶ Closing ──▶ Closed
//! ```
//!
//! Every listener speaks the same HTTP contract; after selection nothing in the
//! lifecycle branches on platform.

#[cfg(windows)]
pub mod pipe;

use axum::Router;
use std::fmt;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{Error, Result};

/// Where a listener is reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Loopback TCP address
    Tcp(SocketAddr),

    /// Filesystem socket (Unix only)
    #[cfg(unix)]
    UnixSocket(PathBuf),

    /// Named pipe (Windows only)
    #[cfg(windows)]
    NamedPipe(String),
}

impl Endpoint {
    /// The platform's local IPC channel
    pub fn local(config: &TransportConfig) -> Self {
        #[cfg(windows)]
        let endpoint = Self::NamedPipe(config.pipe_name.clone());

        #[cfg(unix)]
        let endpoint = Self::UnixSocket(config.socket_path.clone());

        #[cfg(not(any(unix, windows)))]
        let endpoint = Self::Tcp(config.tcp_addr);

        endpoint
    }

    /// The optional loopback TCP listener
    pub fn network(config: &TransportConfig) -> Self {
        Self::Tcp(config.tcp_addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),

            #[cfg(unix)]
            Endpoint::UnixSocket(path) => write!(f, "unix://{}", path.display()),

            #[cfg(windows)]
            Endpoint::NamedPipe(name) => write!(f, "pipe://{}", name),
        }
    }
}

/// Lifecycle state of a single listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not bound yet
    Unbound,
    /// Bound, not accepting yet
    Bound,
    /// Accepting connections
    Serving,
    /// No longer accepting; in-flight requests are draining
    Closing,
    /// Fully closed
    Closed,
}

/// Remove a socket file left behind by a previous run
///
/// # Returns
///
/// - `Ok(true)`: A stale file was removed
/// - `Ok(false)`: Nothing to remove (or the endpoint has no filesystem artifact)
/// - `Err(Error::Io)`: The file exists but could not be removed
pub fn remove_stale_artifact(endpoint: &Endpoint) -> Result<bool> {
    match endpoint {
        #[cfg(unix)]
        Endpoint::UnixSocket(path) => match std::fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed stale socket file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        },
        _ => Ok(false),
    }
}

/// A bound listener, ready to be served
#[derive(Debug)]
pub enum BoundListener {
    /// TCP listener
    Tcp(TcpListener),

    /// Unix domain socket listener
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),

    /// Named pipe listener
    #[cfg(windows)]
    Pipe(pipe::NamedPipeListener),
}

impl BoundListener {
    /// The endpoint this listener is actually bound to
    ///
    /// For TCP this carries the real port when port 0 was requested.
    pub fn local_endpoint(&self, requested: &Endpoint) -> Endpoint {
        match self {
            BoundListener::Tcp(listener) => listener
                .local_addr()
                .map(Endpoint::Tcp)
                .unwrap_or_else(|_| requested.clone()),
            #[allow(unreachable_patterns)]
            _ => requested.clone(),
        }
    }
}

/// Bind a listener for `endpoint`
///
/// # Errors
///
/// `Error::Bind` when the address, path or pipe name is unavailable.
pub async fn bind(endpoint: &Endpoint) -> Result<BoundListener> {
    debug!(listener = %endpoint, "Binding");

    let bound = match endpoint {
        Endpoint::Tcp(addr) => TcpListener::bind(addr)
            .await
            .map(BoundListener::Tcp)
            .map_err(|e| Error::bind(endpoint, e))?,

        #[cfg(unix)]
        Endpoint::UnixSocket(path) => tokio::net::UnixListener::bind(path)
            .map(BoundListener::Unix)
            .map_err(|e| Error::bind(endpoint, e))?,

        #[cfg(windows)]
        Endpoint::NamedPipe(name) => pipe::NamedPipeListener::bind(name)
            .map(BoundListener::Pipe)
            .map_err(|e| Error::bind(endpoint, e))?,
    };

    info!(listener = %endpoint, "Listener bound");
    Ok(bound)
}

/// Handle on a listener's serving task
#[derive(Debug)]
pub struct ListenerHandle {
    endpoint: Endpoint,
    state_tx: Arc<watch::Sender<ListenerState>>,
    state: watch::Receiver<ListenerState>,
    task: Option<JoinHandle<Result<()>>>,
}

impl ListenerHandle {
    /// Where the listener is reachable
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Whether the serving task has finished
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the serving task to end
    ///
    /// Cancel-safe: if this future is dropped, the task keeps running and can be
    /// waited on or aborted later.
    pub async fn wait(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };

        let outcome = task.await;
        self.task = None;

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(Error::Io(std::io::Error::other(e))),
        }
    }

    /// Stop the serving task immediately, dropping in-flight connections
    ///
    /// The listener still ends in [`ListenerState::Closed`] and its socket file
    /// is removed, as on a graceful close.
    pub fn abort(&self) {
        let Some(task) = &self.task else {
            return;
        };
        if task.is_finished() {
            return;
        }

        task.abort();
        if let Err(e) = remove_stale_artifact(&self.endpoint) {
            warn!(listener = %self.endpoint, "Failed to remove socket file: {}", e);
        }
        self.state_tx.send_replace(ListenerState::Closed);
        warn!(listener = %self.endpoint, "Listener aborted");
    }
}

/// Serve `router` on `listener` until `cancel` fires
///
/// The listener stops accepting as soon as `cancel` is triggered; the task ends
/// once in-flight connections have drained. Bounding that drain is the caller's
/// job.
pub fn serve(
    endpoint: Endpoint,
    listener: BoundListener,
    router: Router,
    cancel: CancellationToken,
) -> ListenerHandle {
    let (state_tx, state_rx) = watch::channel(ListenerState::Bound);
    let state_tx = Arc::new(state_tx);
    let task_endpoint = endpoint.clone();

    let task_state_tx = Arc::clone(&state_tx);
    let task = tokio::spawn(async move {
        let shutdown = {
            let task_state_tx = Arc::clone(&task_state_tx);
            let endpoint = task_endpoint.clone();
            async move {
                cancel.cancelled().await;
                task_state_tx.send_replace(ListenerState::Closing);
                info!(listener = %endpoint, "Listener closing");
            }
        };

        task_state_tx.send_replace(ListenerState::Serving);
        info!(listener = %task_endpoint, "Serving");

        let result = match listener {
            BoundListener::Tcp(listener) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
            }

            #[cfg(unix)]
            BoundListener::Unix(listener) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
            }

            #[cfg(windows)]
            BoundListener::Pipe(listener) => {
                axum::serve(listener, router)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
        };

        if let Err(e) = remove_stale_artifact(&task_endpoint) {
            warn!(listener = %task_endpoint, "Failed to remove socket file: {}", e);
        }

        task_state_tx.send_replace(ListenerState::Closed);
        info!(listener = %task_endpoint, "Listener closed");

        result.map_err(Error::Io)
    });

    ListenerHandle {
        endpoint,
        state_tx,
        state: state_rx,
        task: Some(task),
    }
}
