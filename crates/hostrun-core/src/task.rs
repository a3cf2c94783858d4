//! Remote task templates and per-host execution

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use hostrun_exec::{ChannelProvider, CredentialContext, RemoteChannel};
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::CoreError;
use crate::hosts::Host;
use crate::report::TaskResult;

/// The work to perform on every host, validated before dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTemplate {
    /// Copy local files into a remote directory
    Upload {
        /// Local files, transferred in order
        files: Vec<PathBuf>,
        /// Remote destination directory; `None` means the login directory
        destination: Option<String>,
    },
    /// Run a shell command
    RunCommand {
        /// Command string passed to the remote shell
        command: String,
    },
}

impl TaskTemplate {
    /// Build an upload template for a single file
    ///
    /// # Errors
    /// Returns `CoreError::LocalFileNotFound` if the file is missing or unreadable
    pub fn upload(
        file: impl Into<PathBuf>,
        destination: Option<String>,
    ) -> Result<Self, CoreError> {
        Self::upload_many([file.into()], destination)
    }

    /// Build an upload template for several files
    ///
    /// # Errors
    /// Returns `CoreError::LocalFileNotFound` for the first missing or unreadable file, or
    /// when no file is given
    pub fn upload_many(
        files: impl IntoIterator<Item = PathBuf>,
        destination: Option<String>,
    ) -> Result<Self, CoreError> {
        let files: Vec<PathBuf> = files.into_iter().collect();
        if files.is_empty() {
            return Err(CoreError::LocalFileNotFound("<none given>".to_string()));
        }
        for file in &files {
            check_readable_file(file)?;
        }

        let destination = destination.filter(|d| !d.trim().is_empty());
        Ok(Self::Upload { files, destination })
    }

    /// Build a command template
    ///
    /// # Errors
    /// Returns `CoreError::EmptyCommand` if the command is empty or whitespace
    pub fn run(command: impl Into<String>) -> Result<Self, CoreError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(CoreError::EmptyCommand);
        }
        Ok(Self::RunCommand { command })
    }

    /// Build a command template from several commands joined with `"; "`
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    /// Returns `CoreError::EmptyCommand` if nothing remains
    pub fn run_many<S: AsRef<str>>(commands: &[S]) -> Result<Self, CoreError> {
        let joined = commands
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !c.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        Self::run(joined)
    }

    /// Short label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TaskTemplate::Upload { .. } => "upload",
            TaskTemplate::RunCommand { .. } => "run",
        }
    }
}

fn check_readable_file(path: &Path) -> Result<(), CoreError> {
    let not_found = || CoreError::LocalFileNotFound(path.display().to_string());

    let metadata = std::fs::metadata(path).map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }
    File::open(path).map_err(|_| not_found())?;
    Ok(())
}

/// One template bound to one host
#[derive(Debug, Clone)]
pub struct RemoteTask<'a> {
    /// Target host
    pub host: &'a Host,
    /// Work to perform
    pub template: &'a TaskTemplate,
}

impl<'a> RemoteTask<'a> {
    /// Bind a template to a host
    #[must_use]
    pub fn new(host: &'a Host, template: &'a TaskTemplate) -> Self {
        Self { host, template }
    }

    /// Execute against the host, always producing a result
    ///
    /// Applies the configured task timeout over connect plus work.
    pub async fn execute(
        &self,
        provider: &dyn ChannelProvider,
        credential: &CredentialContext,
        config: &DispatchConfig,
    ) -> TaskResult {
        let start = Instant::now();

        let outcome = match config.task_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.execute_inner(provider, credential, config))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CoreError::RemoteTimeout(limit).into()),
                }
            }
            None => self.execute_inner(provider, credential, config).await,
        };

        let duration = start.elapsed();
        match outcome {
            Ok(done) => done.into_result(self.host.clone(), duration),
            Err(Aborted { error, stdout }) => {
                warn!(host = %self.host, error = %error, "task failed");
                let mut result = TaskResult::failed(self.host.clone(), error, duration);
                result.stdout = stdout;
                result
            }
        }
    }

    async fn execute_inner(
        &self,
        provider: &dyn ChannelProvider,
        credential: &CredentialContext,
        config: &DispatchConfig,
    ) -> Result<Completed, Aborted> {
        let mut channel = provider
            .connect(
                &self.host.connection_info(),
                credential,
                config.connect_timeout,
            )
            .await
            .map_err(CoreError::from)?;

        let outcome = self.perform(channel.as_mut()).await;

        if let Err(e) = channel.close().await {
            debug!(host = %self.host, error = %e, "channel close failed");
        }

        outcome
    }

    async fn perform(&self, channel: &mut dyn RemoteChannel) -> Result<Completed, Aborted> {
        match self.template {
            TaskTemplate::Upload { files, destination } => {
                let mut written = Vec::with_capacity(files.len());
                for file in files {
                    match channel.upload_file(file, destination.as_deref()).await {
                        Ok(target) => {
                            debug!(host = %self.host, target = %target, "upload complete");
                            written.push(target);
                        }
                        // files already written stay on the host
                        Err(e) => {
                            return Err(Aborted {
                                error: e.into(),
                                stdout: written.join("\n"),
                            });
                        }
                    }
                }
                Ok(Completed {
                    exit_code: 0,
                    stdout: written.join("\n"),
                    stderr: String::new(),
                })
            }
            TaskTemplate::RunCommand { command } => {
                let output = channel
                    .run_command(command)
                    .await
                    .map_err(CoreError::from)?;
                Ok(Completed {
                    exit_code: output.status,
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
        }
    }
}

/// Work that stopped early, with the output produced before the failure
struct Aborted {
    error: CoreError,
    stdout: String,
}

impl From<CoreError> for Aborted {
    fn from(error: CoreError) -> Self {
        Self {
            error,
            stdout: String::new(),
        }
    }
}

/// Work that reached the host and reported back
struct Completed {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl Completed {
    fn into_result(self, host: Host, duration: std::time::Duration) -> TaskResult {
        let error = (self.exit_code != 0).then(|| CoreError::RemoteExecutionFailed {
            status: self.exit_code,
            message: self.stderr.trim().to_string(),
        });

        TaskResult {
            host,
            succeeded: error.is_none(),
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            error,
            duration,
        }
    }
}
