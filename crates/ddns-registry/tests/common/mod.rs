//! Shared fixtures for the service contract tests
//!
//! Every test gets its own temporary directory holding the database and the
//! local socket, so tests never see each other's listeners.

#![allow(dead_code)]

use ddns_registry::traits::Value;
use ddns_registry::{
    RegistryService, RunningService, ServiceConfig, ServiceIdentity, SqliteStore, StoreGateway,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Identity reported by every test service
pub const TEST_IDENTITY: &str = "test-machine-0001";

/// A temporary directory with an initialized store in it
pub struct TestStore {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
}

impl TestStore {
    /// Create an empty store with the schema in place
    pub async fn new() -> Self {
        let store = Self::uninitialized();
        store.store.initialize_schema().await.expect("schema created");
        store
    }

    /// Create a store whose tables do not exist
    pub fn uninitialized() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = Arc::new(SqliteStore::new(dir.path().join("config.db")));
        Self { dir, store }
    }

    /// Where the local socket of this test lives
    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("connection")
    }

    /// Configuration pointing everything into the temporary directory
    pub fn config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::new();
        config.database_path = self.store.path().to_path_buf();
        config.transport.socket_path = self.socket_path();
        config.transport.tcp_addr = SocketAddr::from(([127, 0, 0, 1], 0));
        config.companion.dir = self.dir.path().to_path_buf();
        config.companion.enabled = false;
        config.favicon_path = self.dir.path().join("goddns.ico");
        config.shutdown_grace_secs = 2;
        config
    }

    /// Write a configuration flag
    pub async fn set_flag(&self, name: &str, value: &str) {
        self.store
            .execute(
                "INSERT INTO CONFIG(NAME, VALUE) VALUES(?1, ?2)",
                vec![Value::Text(name.to_string()), Value::Text(value.to_string())],
            )
            .await
            .expect("flag written");
    }

    /// Write a provider row directly, bypassing the service
    pub async fn insert_provider(&self, id: &str, name: &str, address: &str, selected: bool) {
        self.store
            .execute(
                "INSERT INTO PROVIDERS(ID, NAME, ADDRESS, SELECTED) VALUES(?1, ?2, ?3, ?4)",
                vec![
                    Value::Text(id.to_string()),
                    Value::Text(name.to_string()),
                    Value::Text(address.to_string()),
                    Value::Integer(i64::from(selected)),
                ],
            )
            .await
            .expect("provider written");
    }

    /// Start a service over this store
    pub async fn start(&self) -> RunningService {
        self.start_with(self.config()).await.expect("service starts")
    }

    /// Start a service with an explicit configuration
    pub async fn start_with(&self, config: ServiceConfig) -> ddns_registry::Result<RunningService> {
        RegistryService::new(config, self.store.clone())
            .with_identity(ServiceIdentity::from(TEST_IDENTITY.to_string()))
            .start()
            .await
    }
}

/// Minimal HTTP response
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Send one HTTP/1.0 request over a unix socket
///
/// HTTP/1.0 makes the server close the connection after the response, so the
/// whole reply can simply be read to EOF.
#[cfg(unix)]
pub async fn request_over_socket(
    path: &Path,
    method: &str,
    uri: &str,
    form: Option<&str>,
) -> std::io::Result<RawResponse> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut stream = tokio::net::UnixStream::connect(path).await?;

    let mut request = format!("{} {} HTTP/1.0\r\nHost: localhost\r\n", method, uri);
    if let Some(body) = form {
        request.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
        request.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    } else {
        request.push_str("\r\n");
    }
    stream.write_all(request.as_bytes()).await?;

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no response"))??;

    Ok(parse_response(&String::from_utf8_lossy(&raw)))
}

/// `GET` over a unix socket, panicking on transport errors
#[cfg(unix)]
pub async fn get_over_socket(path: &Path, uri: &str) -> RawResponse {
    request_over_socket(path, "GET", uri, None)
        .await
        .expect("request over socket")
}

/// Form `POST` over a unix socket, panicking on transport errors
#[cfg(unix)]
pub async fn post_over_socket(path: &Path, uri: &str, form: &str) -> RawResponse {
    request_over_socket(path, "POST", uri, Some(form))
        .await
        .expect("request over socket")
}

fn parse_response(raw: &str) -> RawResponse {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line");

    RawResponse {
        status,
        body: body.to_string(),
    }
}
