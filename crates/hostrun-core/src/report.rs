//! Per-host results and the aggregate report

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::hosts::Host;

/// Exit code used when the invocation was interrupted
pub const EXIT_CANCELLED: u8 = 130;

/// Largest exit code used for counting failed hosts
pub const EXIT_FAILURE_CAP: u8 = 125;

/// Outcome of one task on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// Host the task ran against
    pub host: Host,
    /// Whether the task completed with exit status 0
    pub succeeded: bool,
    /// Remote exit status, -1 when none was reported
    pub exit_code: i32,
    /// Captured stdout (uploaded paths for uploads)
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Failure detail
    pub error: Option<CoreError>,
    /// Wall time spent on this host
    pub duration: Duration,
}

impl TaskResult {
    /// Result for a task that failed before reporting an exit status
    #[must_use]
    pub fn failed(host: Host, error: CoreError, duration: Duration) -> Self {
        let exit_code = match &error {
            CoreError::RemoteExecutionFailed { status, .. } => *status,
            _ => -1,
        };
        Self {
            host,
            succeeded: false,
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
            duration,
        }
    }

    /// `user@address: OK|FAILED (exit=n)`
    #[must_use]
    pub fn summary_line(&self) -> String {
        let status = if self.succeeded { "OK" } else { "FAILED" };
        format!("{}: {status} (exit={})", self.host, self.exit_code)
    }
}

/// Overall status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Every host succeeded
    Success,
    /// At least one host failed
    Failed,
    /// Interrupted before every host finished
    Cancelled,
}

/// Host-ordered results of one invocation
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    /// Results in host set order; truncated to completed hosts when cancelled
    pub results: Vec<TaskResult>,
    /// Size of the host set
    pub total_hosts: usize,
    /// Whether cancellation finalized the report early
    pub cancelled: bool,
    /// Dispatch start
    pub started_at: DateTime<Utc>,
    /// Dispatch end
    pub finished_at: DateTime<Utc>,
}

impl AggregateReport {
    /// True iff not cancelled and every result succeeded
    #[must_use]
    pub fn overall_success(&self) -> bool {
        !self.cancelled && self.results.iter().all(|r| r.succeeded)
    }

    /// Overall status
    #[must_use]
    pub fn status(&self) -> ReportStatus {
        if self.cancelled {
            ReportStatus::Cancelled
        } else if self.overall_success() {
            ReportStatus::Success
        } else {
            ReportStatus::Failed
        }
    }

    /// Number of successful hosts
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    /// Number of hosts that produced a failed result
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }

    /// Hosts that never produced a result
    #[must_use]
    pub fn incomplete_count(&self) -> usize {
        self.total_hosts - self.results.len()
    }

    /// One summary line per reported host, in host set order
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        self.results.iter().map(TaskResult::summary_line).collect()
    }

    /// `N/M hosts succeeded`
    #[must_use]
    pub fn aggregate_line(&self) -> String {
        format!(
            "{}/{} hosts succeeded",
            self.succeeded_count(),
            self.total_hosts
        )
    }

    /// Process exit code
    ///
    /// `0` on success, the failed host count capped at 125 on failure, and 130 when
    /// cancelled.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.status() {
            ReportStatus::Success => 0,
            ReportStatus::Cancelled => EXIT_CANCELLED,
            ReportStatus::Failed => {
                let failed = self.failed_count().max(1);
                u8::try_from(failed)
                    .unwrap_or(EXIT_FAILURE_CAP)
                    .min(EXIT_FAILURE_CAP)
            }
        }
    }
}

/// Collects results into host-indexed slots as they arrive
#[derive(Debug)]
pub struct ReportBuilder {
    slots: Vec<Option<TaskResult>>,
    started_at: DateTime<Utc>,
}

impl ReportBuilder {
    /// Create a builder with one empty slot per host
    #[must_use]
    pub fn new(total_hosts: usize) -> Self {
        Self {
            slots: vec![None; total_hosts],
            started_at: Utc::now(),
        }
    }

    /// Store the result for the host at `index`
    ///
    /// A slot is written once; a second write for the same index is ignored.
    pub fn record(&mut self, index: usize, result: TaskResult) {
        if let Some(slot) = self.slots.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(result);
        }
    }

    /// Number of filled slots
    #[must_use]
    pub fn completed(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Finalize in host set order, dropping empty slots
    #[must_use]
    pub fn finish(self, cancelled: bool) -> AggregateReport {
        let total_hosts = self.slots.len();
        let results: Vec<TaskResult> = self.slots.into_iter().flatten().collect();
        // a report missing results without a cancel would hide hosts
        let cancelled = cancelled || results.len() < total_hosts;

        AggregateReport {
            results,
            total_hosts,
            cancelled,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
