//! `Dispatcher`: fans a task template out across a host set
//!
//! Sequential mode walks the hosts in order. Concurrent mode spawns one tokio task per
//! host and joins them in host order; results land in per-host slots so the report order
//! never depends on completion order.

use std::sync::Arc;
use std::time::Duration;

use hostrun_exec::{ChannelProvider, CredentialContext};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{DispatchConfig, DispatchMode};
use crate::error::CoreError;
use crate::hosts::{Host, HostSet};
use crate::report::{AggregateReport, ReportBuilder, TaskResult};
use crate::task::{RemoteTask, TaskTemplate};

/// Executes one task template against every host of a set
pub struct Dispatcher {
    provider: Arc<dyn ChannelProvider>,
    credential: Arc<CredentialContext>,
    config: Arc<DispatchConfig>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("provider", &self.provider.provider_type())
            .field("credential", &self.credential)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    /// * `provider` - Opens channels to hosts
    /// * `credential` - Key used for every connection
    /// * `config` - Mode, timeouts and concurrency cap
    pub fn new(
        provider: Arc<dyn ChannelProvider>,
        credential: CredentialContext,
        config: DispatchConfig,
    ) -> Self {
        Self {
            provider,
            credential: Arc::new(credential),
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops this dispatcher when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `template` on every host and collect a host-ordered report
    ///
    /// Per-host failures are recorded, never propagated. Cancellation stops new launches,
    /// drops in-flight channels and returns the results gathered so far.
    pub async fn dispatch(&self, hosts: &HostSet, template: &TaskTemplate) -> AggregateReport {
        info!(
            hosts = hosts.len(),
            kind = template.kind(),
            mode = ?self.config.mode,
            provider = self.provider.provider_type(),
            "starting dispatch"
        );

        let report = match self.config.mode {
            DispatchMode::Sequential => self.dispatch_sequential(hosts, template).await,
            DispatchMode::Concurrent => self.dispatch_concurrent(hosts, template).await,
        };

        info!(
            total = report.total_hosts,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled,
            "dispatch finished"
        );

        report
    }

    async fn dispatch_sequential(&self, hosts: &HostSet, template: &TaskTemplate) -> AggregateReport {
        let mut builder = ReportBuilder::new(hosts.len());
        let mut interrupted = false;

        for (index, host) in hosts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let task = RemoteTask::new(host, template);
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    warn!(host = %host, "task interrupted");
                    interrupted = true;
                    break;
                }
                result = task.execute(self.provider.as_ref(), &self.credential, &self.config) => {
                    builder.record(index, result);
                }
            }
        }

        if interrupted {
            warn!(
                error = %CoreError::Cancelled,
                completed = builder.completed(),
                total = hosts.len(),
                "dispatch stopped early"
            );
        }

        builder.finish(interrupted)
    }

    async fn dispatch_concurrent(&self, hosts: &HostSet, template: &TaskTemplate) -> AggregateReport {
        let template = Arc::new(template.clone());
        let semaphore = self
            .config
            .max_parallel
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut handles = Vec::with_capacity(hosts.len());

        for host in hosts {
            let provider = self.provider.clone();
            let credential = self.credential.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            let template = template.clone();
            let semaphore = semaphore.clone();
            let task_host = host.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => {
                        let permit = tokio::select! {
                            biased;
                            () = cancel.cancelled() => return None,
                            permit = semaphore.acquire_owned() => permit,
                        };
                        match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => return None,
                        }
                    }
                    None => None,
                };

                let task = RemoteTask::new(&task_host, &template);
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        warn!(host = %task_host, "task interrupted");
                        None
                    }
                    result = task.execute(provider.as_ref(), &credential, &config) => Some(result),
                }
            });

            handles.push((host.clone(), handle));
        }

        // Join in host order; slots make completion order irrelevant
        let mut builder = ReportBuilder::new(hosts.len());
        let mut interrupted = false;

        for (index, (host, handle)) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Some(result)) => builder.record(index, result),
                Ok(None) => interrupted = true,
                Err(e) => {
                    error!(host = %host, error = %e, "task panicked");
                    builder.record(index, panicked(host, &e));
                }
            }
        }

        if interrupted {
            warn!(
                error = %CoreError::Cancelled,
                completed = builder.completed(),
                total = hosts.len(),
                "dispatch stopped early"
            );
        }

        builder.finish(interrupted)
    }
}

fn panicked(host: Host, err: &tokio::task::JoinError) -> TaskResult {
    TaskResult::failed(
        host,
        CoreError::RemoteExecutionFailed {
            status: -1,
            message: format!("task panicked: {err}"),
        },
        Duration::ZERO,
    )
}
