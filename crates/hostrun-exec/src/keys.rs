//! Private key credential shared by every connection of an invocation

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Path to the private key used to authenticate every remote connection
///
/// Validated once at construction and read-only afterwards. The key contents are not
/// inspected here; format problems surface when a channel loads the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialContext {
    key_path: PathBuf,
}

impl CredentialContext {
    /// Create a credential context from a key file path
    ///
    /// # Errors
    /// Returns `KeyError::NotFound` if the path does not exist, is not a regular file, or
    /// cannot be opened for reading
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, KeyError> {
        let key_path = path.into();

        if key_path.as_os_str().is_empty() {
            return Err(KeyError::NotFound("<unset>".to_string()));
        }

        let metadata = std::fs::metadata(&key_path)
            .map_err(|_| KeyError::NotFound(key_path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(KeyError::NotFound(key_path.display().to_string()));
        }

        File::open(&key_path).map_err(|_| KeyError::NotFound(key_path.display().to_string()))?;

        warn_if_permissions_open(&key_path, &metadata);
        debug!(path = %key_path.display(), "credential validated");

        Ok(Self { key_path })
    }

    /// Path to the key file
    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key file not found or unreadable: {0}")]
    NotFound(String),
}

#[cfg(unix)]
fn warn_if_permissions_open(path: &Path, metadata: &std::fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;

    // group/other bits
    if metadata.permissions().mode() & 0o77 != 0 {
        warn!(
            path = %path.display(),
            "key file permissions too open (should be 600); the server may reject it"
        );
    }
}

#[cfg(not(unix))]
fn warn_if_permissions_open(_path: &Path, _metadata: &std::fs::Metadata) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_existing_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not really a key").unwrap();

        let ctx = CredentialContext::new(file.path()).unwrap();
        assert_eq!(ctx.key_path(), file.path());
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let result = CredentialContext::new(dir.path().join("missing.pem"));

        assert!(matches!(result, Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_directory_is_not_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let result = CredentialContext::new(dir.path());

        assert!(matches!(result, Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_empty_path() {
        let result = CredentialContext::new("");
        assert!(matches!(result, Err(KeyError::NotFound(p)) if p == "<unset>"));
    }
}
