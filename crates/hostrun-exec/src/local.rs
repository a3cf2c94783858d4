//! Loopback channel using `tokio::process` and the local filesystem

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::keys::CredentialContext;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::{ChannelProvider, RemoteChannel, remote_target};

/// Local channel provider
///
/// Runs commands on this machine through `sh -c` and copies uploads on the local
/// filesystem. The target user and credential are not used.
#[derive(Debug, Clone, Default)]
pub struct LocalProvider;

impl LocalProvider {
    /// Create a new local provider
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChannelProvider for LocalProvider {
    async fn connect(
        &self,
        target: &ConnectionInfo,
        _credential: &CredentialContext,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteChannel>, ExecError> {
        debug!(host = %target.host, user = %target.user, "opening local channel");
        Ok(Box::new(LocalChannel { open: true }))
    }

    fn provider_type(&self) -> &'static str {
        "local"
    }
}

/// Channel returned by `LocalProvider`
#[derive(Debug)]
pub struct LocalChannel {
    open: bool,
}

impl LocalChannel {
    fn ensure_open(&self) -> Result<(), ExecError> {
        if self.open {
            Ok(())
        } else {
            Err(ExecError::NotConnected)
        }
    }
}

#[async_trait]
impl RemoteChannel for LocalChannel {
    #[instrument(skip(self), level = "debug")]
    async fn upload_file(
        &mut self,
        local_path: &Path,
        remote_dir: Option<&str>,
    ) -> Result<String, ExecError> {
        self.ensure_open()?;

        let target = remote_target(local_path, remote_dir)?;
        tokio::fs::copy(local_path, &target)
            .await
            .map_err(|e| ExecError::TransferFailed(format!("{target}: {e}")))?;

        debug!(target = %target, "copied file");
        Ok(target)
    }

    #[instrument(skip(self), level = "debug")]
    async fn run_command(&mut self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.ensure_open()?;

        let start = Instant::now();

        // Use shell to support pipes, redirections, etc.
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "command completed"
        );

        if !output.status.success() {
            error!(command = %cmd, status = status, "command failed");
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    async fn close(&mut self) -> Result<(), ExecError> {
        self.open = false;
        Ok(())
    }
}
