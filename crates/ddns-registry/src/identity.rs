//! Service identity
//!
//! A machine identifier computed once per process and shared read-only by
//! every handler, whichever listener served the request.

use std::fmt;
use std::sync::Arc;

/// Process-lifetime machine identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity(Arc<str>);

impl ServiceIdentity {
    /// Read the host's machine id
    ///
    /// Detection failure is logged and yields an empty identity; the service
    /// still starts.
    pub fn detect() -> Self {
        match machine_uid::get() {
            Ok(id) => {
                tracing::debug!(machine_id = %id, "Detected machine id");
                Self::from(id)
            }
            Err(e) => {
                tracing::error!("Failed to read machine id: {}", e);
                Self::from(String::new())
            }
        }
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ServiceIdentity {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
