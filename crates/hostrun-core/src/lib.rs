//! hostrun-core: Host parsing, task dispatch and result reporting
//!
//! Parses the host set, validates the task template, fans the task out to every host
//! through a `ChannelProvider` and gathers a host-ordered `AggregateReport`.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hosts;
pub mod report;
pub mod task;

pub use config::{DispatchConfig, DispatchMode};
pub use dispatcher::Dispatcher;
pub use error::CoreError;
pub use hosts::{Host, HostSet};
pub use report::{AggregateReport, ReportBuilder, ReportStatus, TaskResult};
pub use task::{RemoteTask, TaskTemplate};

/// Validate a key path into a credential context
///
/// # Errors
/// Returns `CoreError::CredentialNotFound` if the key is missing or unreadable
pub fn load_credential(
    path: impl Into<std::path::PathBuf>,
) -> Result<hostrun_exec::CredentialContext, CoreError> {
    Ok(hostrun_exec::CredentialContext::new(path)?)
}
