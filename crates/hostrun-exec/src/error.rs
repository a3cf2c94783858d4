//! Error types for hostrun-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur on a remote execution channel
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// File transfer failed
    #[error("file transfer failed: {0}")]
    TransferFailed(String),

    /// Connect or operation timed out
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key could not be loaded
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Channel already closed
    #[error("not connected")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ExecError::Timeout {
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "timed out after 2s");
        assert_eq!(
            ExecError::TransferFailed("/tmp/a.txt: permission denied".into()).to_string(),
            "file transfer failed: /tmp/a.txt: permission denied"
        );
    }
}
