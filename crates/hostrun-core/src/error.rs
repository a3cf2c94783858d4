//! Core error types for hostrun-core

use std::time::Duration;

use hostrun_exec::{ExecError, KeyError};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while preparing or dispatching remote work
///
/// Input errors are fatal and stop the invocation before any host is contacted. Remote
/// errors are confined to the `TaskResult` of the host they happened on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum CoreError {
    /// Host specification was empty or whitespace
    #[error("no hosts given (set EC2_HOSTS to user@host,user@host,...)")]
    EmptyHostSpec,

    /// A host token was not `user@address`
    #[error("invalid host spec token: {0:?} (expected user@address)")]
    InvalidHostSpec(String),

    /// Private key missing or unreadable
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// Upload source missing or unreadable
    #[error("local file not found: {0}")]
    LocalFileNotFound(String),

    /// Command string was empty
    #[error("command is empty")]
    EmptyCommand,

    /// Could not reach the host
    #[error("connect failed: {0}")]
    RemoteConnectFailed(String),

    /// Host rejected the key or the key could not be loaded
    #[error("authentication failed: {0}")]
    RemoteAuthFailed(String),

    /// Connect or task exceeded its time limit
    #[error("timed out after {0:?}")]
    RemoteTimeout(Duration),

    /// Remote command exited non-zero or the remote operation failed
    #[error("remote execution failed (exit={status}): {message}")]
    RemoteExecutionFailed {
        /// Remote exit status, -1 when none was reported
        status: i32,
        /// Failure detail
        message: String,
    },

    /// Invocation was interrupted
    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether this error aborts the whole invocation before dispatch
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyHostSpec
                | CoreError::InvalidHostSpec(_)
                | CoreError::CredentialNotFound(_)
                | CoreError::LocalFileNotFound(_)
                | CoreError::EmptyCommand
        )
    }
}

impl From<ExecError> for CoreError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::ConnectionFailed(msg) => CoreError::RemoteConnectFailed(msg),
            ExecError::AuthenticationFailed(msg) | ExecError::SshKeyError(msg) => {
                CoreError::RemoteAuthFailed(msg)
            }
            ExecError::Timeout { timeout } => CoreError::RemoteTimeout(timeout),
            other @ (ExecError::TransferFailed(_)
            | ExecError::IoError(_)
            | ExecError::NotConnected) => CoreError::RemoteExecutionFailed {
                status: -1,
                message: other.to_string(),
            },
        }
    }
}

impl From<KeyError> for CoreError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::NotFound(path) => CoreError::CredentialNotFound(path),
        }
    }
}
