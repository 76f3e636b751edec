//! Windows named pipe listener
//!
//! Adapts tokio's named pipe server to axum's `Listener` contract so the pipe
//! is served exactly like the TCP and unix socket listeners.
//!
//! A pipe instance serves one client. After each client connects, a fresh
//! instance is created under the same name for the next one.

use axum::serve::Listener;
use std::io;
use std::time::Duration;
use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};
use tracing::{error, trace};

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accepts clients on a named pipe
#[derive(Debug)]
pub struct NamedPipeListener {
    name: String,
    next: NamedPipeServer,
}

impl NamedPipeListener {
    /// Create the first pipe instance
    ///
    /// Fails if another process already owns a pipe with this name.
    pub fn bind(name: &str) -> io::Result<Self> {
        let next = ServerOptions::new().first_pipe_instance(true).create(name)?;
        Ok(Self {
            name: name.to_string(),
            next,
        })
    }

    fn fresh_instance(&self) -> io::Result<NamedPipeServer> {
        ServerOptions::new().create(&self.name)
    }
}

impl Listener for NamedPipeListener {
    type Io = NamedPipeServer;
    type Addr = String;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            if let Err(e) = self.next.connect().await {
                error!(pipe_name = %self.name, error = %e, "Failed to connect named pipe client");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            trace!(pipe_name = %self.name, "Named pipe client connected");

            // The connected instance is handed out; keep trying until the
            // replacement exists so the name never disappears.
            loop {
                match self.fresh_instance() {
                    Ok(fresh) => {
                        let connected = std::mem::replace(&mut self.next, fresh);
                        return (connected, self.name.clone());
                    }
                    Err(e) => {
                        error!(pipe_name = %self.name, error = %e, "Failed to create named pipe instance");
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.name.clone())
    }
}
