//! Report rendering

use std::io::{self, Write};

use hostrun_core::{AggregateReport, CoreError};

/// Write captured output, per-host summaries and the aggregate line
pub fn render_text(report: &AggregateReport, out: &mut impl Write) -> io::Result<()> {
    for result in &report.results {
        for line in result.stdout.lines().chain(result.stderr.lines()) {
            writeln!(out, "[{}] {line}", result.host)?;
        }
    }

    for result in &report.results {
        writeln!(out, "{}", result.summary_line())?;
        if let Some(err) = &result.error {
            writeln!(out, "    error: {err}")?;
        }
    }

    if report.cancelled {
        writeln!(
            out,
            "{}: {} host(s) did not complete",
            CoreError::Cancelled,
            report.incomplete_count()
        )?;
    }

    writeln!(out, "{}", report.aggregate_line())
}

/// Write the report as pretty JSON
pub fn render_json(report: &AggregateReport, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hostrun_core::{Host, ReportBuilder, TaskResult};

    use super::*;

    fn sample(cancelled: bool) -> AggregateReport {
        let alice = Host::parse("alice@10.0.0.1").unwrap();
        let bob = Host::parse("bob@10.0.0.2").unwrap();

        let mut builder = ReportBuilder::new(3);
        builder.record(
            0,
            TaskResult {
                host: alice,
                succeeded: true,
                exit_code: 0,
                stdout: "hi\n".to_string(),
                stderr: String::new(),
                error: None,
                duration: Duration::from_millis(4),
            },
        );
        builder.record(
            1,
            TaskResult::failed(
                bob,
                CoreError::RemoteConnectFailed("connection refused".into()),
                Duration::ZERO,
            ),
        );
        if !cancelled {
            let carol = Host::parse("carol@10.0.0.3").unwrap();
            builder.record(
                2,
                TaskResult::failed(
                    carol,
                    CoreError::RemoteExecutionFailed {
                        status: 1,
                        message: String::new(),
                    },
                    Duration::ZERO,
                ),
            );
        }
        builder.finish(cancelled)
    }

    #[test]
    fn test_render_text() {
        let mut out = Vec::new();
        render_text(&sample(false), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "[alice@10.0.0.1] hi\n\
             alice@10.0.0.1: OK (exit=0)\n\
             bob@10.0.0.2: FAILED (exit=-1)\n    error: connect failed: connection refused\n\
             carol@10.0.0.3: FAILED (exit=1)\n    error: remote execution failed (exit=1): \n\
             1/3 hosts succeeded\n"
        );
    }

    #[test]
    fn test_render_text_cancelled() {
        let mut out = Vec::new();
        render_text(&sample(true), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("cancelled: 1 host(s) did not complete\n"));
        assert!(text.ends_with("1/3 hosts succeeded\n"));
    }

    #[test]
    fn test_render_json() {
        let mut out = Vec::new();
        render_json(&sample(false), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total_hosts"], 3);
        assert_eq!(value["results"][0]["host"]["user"], "alice");
        assert_eq!(value["results"][1]["error"]["kind"], "RemoteConnectFailed");
        assert_eq!(value["cancelled"], false);
    }
}
