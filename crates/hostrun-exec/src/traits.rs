//! Channel provider traits

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::keys::CredentialContext;
use crate::result::{CommandResult, ConnectionInfo};

/// Opens authenticated channels to remote hosts
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Connect and authenticate as `target.user` using the credential's key
    ///
    /// `connect_timeout` bounds connection plus authentication.
    async fn connect(
        &self,
        target: &ConnectionInfo,
        credential: &CredentialContext,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteChannel>, ExecError>;

    /// Short name used in logs
    fn provider_type(&self) -> &'static str;
}

/// An open channel to a single host
#[async_trait]
pub trait RemoteChannel: Send {
    /// Copy `local_path` into `remote_dir`, overwriting a file of the same name
    ///
    /// With no `remote_dir` the file lands in the login directory. Returns the remote path
    /// that was written.
    async fn upload_file(
        &mut self,
        local_path: &Path,
        remote_dir: Option<&str>,
    ) -> Result<String, ExecError>;

    /// Run `cmd` in a remote shell, capturing output and exit status
    async fn run_command(&mut self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Close the channel
    async fn close(&mut self) -> Result<(), ExecError>;
}

/// Join a remote directory and a local file's name into a remote path
///
/// # Errors
/// Returns `ExecError::TransferFailed` if `local_path` has no file name
pub fn remote_target(local_path: &Path, remote_dir: Option<&str>) -> Result<String, ExecError> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ExecError::TransferFailed(format!("no file name in {}", local_path.display()))
        })?;

    Ok(match remote_dir.map(|d| d.trim_end_matches('/')) {
        None => file_name.to_string(),
        Some("") => format!("/{file_name}"),
        Some(dir) => format!("{dir}/{file_name}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_target_with_dir() {
        let target = remote_target(Path::new("/tmp/a.txt"), Some("/home/x")).unwrap();
        assert_eq!(target, "/home/x/a.txt");

        let trailing = remote_target(Path::new("/tmp/a.txt"), Some("/home/x/")).unwrap();
        assert_eq!(trailing, "/home/x/a.txt");
    }

    #[test]
    fn test_remote_target_root_and_home() {
        assert_eq!(
            remote_target(Path::new("a.txt"), Some("/")).unwrap(),
            "/a.txt"
        );
        assert_eq!(remote_target(Path::new("dir/a.txt"), None).unwrap(), "a.txt");
    }

    #[test]
    fn test_remote_target_without_file_name() {
        let result = remote_target(Path::new("/"), Some("/home/x"));
        assert!(matches!(result, Err(ExecError::TransferFailed(_))));
    }
}
