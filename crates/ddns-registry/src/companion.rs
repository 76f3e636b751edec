//! Companion application launcher
//!
//! Starts the desktop companion that talks to this service over the local
//! channel. The child gets the service's environment and its own working
//! directory; the service's working directory is never touched.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CompanionConfig;
use crate::error::{Error, Result};

/// Launches the companion application
///
/// Launches are serialized: at most one spawn is in flight at a time.
#[derive(Debug)]
pub struct CompanionLauncher {
    dir: PathBuf,
    program: PathBuf,
    args: Vec<String>,
    enabled: bool,
    in_flight: Mutex<()>,
}

impl CompanionLauncher {
    /// Create a launcher for `program`, resolved against `dir`
    pub fn new(dir: impl Into<PathBuf>, program: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            program: program.into(),
            args: vec![".".to_string()],
            enabled: true,
            in_flight: Mutex::new(()),
        }
    }

    /// Build a launcher from configuration
    pub fn from_config(config: &CompanionConfig) -> Self {
        Self::new(&config.dir, &config.program).with_enabled(config.enabled)
    }

    /// Replace the argument list (defaults to `.`)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Enable or disable launching
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Working directory the companion runs in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the companion executable
    pub fn program_path(&self) -> PathBuf {
        self.dir.join(&self.program)
    }

    /// Spawn the companion
    ///
    /// # Returns
    ///
    /// - `Ok(Some(pid))`: The companion was started
    /// - `Ok(None)`: Launching is disabled
    /// - `Err(Error::Subprocess)`: The spawn failed
    pub async fn launch(&self) -> Result<Option<u32>> {
        if !self.enabled {
            debug!("Companion launch disabled, skipping");
            return Ok(None);
        }

        let _guard = self.in_flight.lock().await;
        let program = self.program_path();
        debug!(dir = %self.dir.display(), program = %program.display(), "Launching companion");

        let mut child = Command::new(&program)
            .args(&self.args)
            .current_dir(&self.dir)
            .envs(std::env::vars_os())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::subprocess(format!("failed to start {}: {}", program.display(), e))
            })?;

        let pid = child.id();
        info!(pid = ?pid, "Companion launched");

        // Reap the child so it does not linger as a zombie
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Companion exited: {}", status),
                Err(e) => warn!("Failed to wait for companion: {}", e),
            }
        });

        Ok(pid)
    }

    /// Spawn the companion, logging and swallowing any failure
    pub async fn launch_best_effort(&self) {
        if let Err(e) = self.launch().await {
            warn!("Companion launch failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disabled_launcher_does_nothing() {
        let dir = TempDir::new().unwrap();
        let launcher = CompanionLauncher::new(dir.path(), "missing").with_enabled(false);

        assert_eq!(launcher.launch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_subprocess_error() {
        let dir = TempDir::new().unwrap();
        let launcher = CompanionLauncher::new(dir.path(), "nwjs-sdk/nw");

        let err = launcher.launch().await.unwrap_err();
        assert!(matches!(err, Error::Subprocess(_)));

        // Best-effort variant swallows the same failure
        launcher.launch_best_effort().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_companion_runs_in_its_directory() {
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("companion.sh"), "pwd > launched.txt\n").unwrap();

        // An absolute program is not joined onto the directory
        let cwd_before = std::env::current_dir().unwrap();
        let launcher = CompanionLauncher::new(dir.path(), "/bin/sh")
            .with_args(vec!["companion.sh".to_string()]);
        assert_eq!(launcher.program_path(), PathBuf::from("/bin/sh"));
        assert_eq!(launcher.dir(), dir.path());
        assert!(launcher.launch().await.unwrap().is_some());

        let marker = dir.path().join("launched.txt");
        let mut written = String::new();
        for _ in 0..50 {
            if let Ok(contents) = std::fs::read_to_string(&marker)
                && !contents.is_empty()
            {
                written = contents;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(
            std::fs::canonicalize(written.trim()).unwrap(),
            std::fs::canonicalize(dir.path()).unwrap()
        );
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }
}
