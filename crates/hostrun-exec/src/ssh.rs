//! SSH channels using the russh crate, with SFTP uploads via russh-sftp

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::CredentialContext;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::{ChannelProvider, RemoteChannel, remote_target};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    host: String,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(ssh_key::HashAlg::Sha256),
            "accepting server key"
        );
        Ok(true)
    }
}

/// SSH channel provider
#[derive(Clone, Default)]
pub struct SshProvider {
    config: Arc<client::Config>,
}

impl std::fmt::Debug for SshProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshProvider").finish_non_exhaustive()
    }
}

impl SshProvider {
    /// Create a provider with russh's default client configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, credential), fields(host = %target.host))]
    async fn open_session(
        &self,
        target: &ConnectionInfo,
        credential: &CredentialContext,
    ) -> Result<client::Handle<SshClientHandler>, ExecError> {
        info!(
            host = %target.host,
            port = target.port,
            user = %target.user,
            "connecting to SSH"
        );

        let handler = SshClientHandler {
            host: target.host.clone(),
        };

        let mut session = client::connect(
            self.config.clone(),
            (&target.host[..], target.port),
            handler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let key_pair = load_secret_key(credential.key_path(), None)
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &target.user,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "public key rejected for user {}",
                target.user
            )));
        }

        info!(host = %target.host, "SSH connected and authenticated");

        Ok(session)
    }
}

#[async_trait]
impl ChannelProvider for SshProvider {
    async fn connect(
        &self,
        target: &ConnectionInfo,
        credential: &CredentialContext,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteChannel>, ExecError> {
        let session = timeout(connect_timeout, self.open_session(target, credential))
            .await
            .map_err(|_| {
                warn!(host = %target.host, timeout = ?connect_timeout, "connect timed out");
                ExecError::Timeout {
                    timeout: connect_timeout,
                }
            })??;

        Ok(Box::new(SshChannel {
            host: target.host.clone(),
            session: Some(session),
        }))
    }

    fn provider_type(&self) -> &'static str {
        "ssh"
    }
}

/// An authenticated SSH session to one host
pub struct SshChannel {
    host: String,
    session: Option<client::Handle<SshClientHandler>>,
}

impl std::fmt::Debug for SshChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannel")
            .field("host", &self.host)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl SshChannel {
    fn session(&self) -> Result<&client::Handle<SshClientHandler>, ExecError> {
        self.session.as_ref().ok_or(ExecError::NotConnected)
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn upload_file(
        &mut self,
        local_path: &Path,
        remote_dir: Option<&str>,
    ) -> Result<String, ExecError> {
        let target = remote_target(local_path, remote_dir)?;
        let session = self.session()?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ExecError::TransferFailed(format!("sftp subsystem: {e}")))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ExecError::TransferFailed(format!("sftp session: {e}")))?;

        let mut local = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| ExecError::IoError(format!("{}: {e}", local_path.display())))?;

        let mut remote = sftp
            .open_with_flags(
                target.clone(),
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| ExecError::TransferFailed(format!("{target}: {e}")))?;

        let bytes = tokio::io::copy(&mut local, &mut remote)
            .await
            .map_err(|e| ExecError::TransferFailed(format!("{target}: {e}")))?;
        remote
            .shutdown()
            .await
            .map_err(|e| ExecError::TransferFailed(format!("{target}: {e}")))?;

        if let Err(e) = sftp.close().await {
            debug!(error = %e, "sftp session close failed");
        }

        debug!(target = %target, bytes, "uploaded file");
        Ok(target)
    }

    #[instrument(skip(self, cmd), fields(host = %self.host))]
    async fn run_command(&mut self, cmd: &str) -> Result<CommandResult, ExecError> {
        let session = self.session()?;

        debug!(command = %cmd, "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // exit-status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = exit_status.cast_signed();
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    async fn close(&mut self) -> Result<(), ExecError> {
        if let Some(session) = self.session.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.host, "SSH disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        let key = tempfile::NamedTempFile::new().unwrap();
        let credential = CredentialContext::new(key.path()).unwrap();
        // port 1 on loopback is reliably closed
        let target = ConnectionInfo::new("127.0.0.1", "root").with_port(1);

        let result = SshProvider::new()
            .connect(&target, &credential, Duration::from_secs(5))
            .await;

        assert!(matches!(
            result,
            Err(ExecError::ConnectionFailed(_) | ExecError::Timeout { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_run_command() {
        let key_path = std::env::var("EC2_PEM_FILE").unwrap();
        let credential = CredentialContext::new(key_path).unwrap();
        let target = ConnectionInfo::from_address("127.0.0.1", "root");

        let mut channel = SshProvider::new()
            .connect(&target, &credential, Duration::from_secs(10))
            .await
            .unwrap();
        let result = channel.run_command("echo hi").await.unwrap();
        channel.close().await.unwrap();

        assert_eq!(result.status, 0);
        assert_eq!(result.stdout.trim(), "hi");
    }
}
