//! hostrun CLI
//!
//! Uploads files to, or runs a shell command on, every host listed in `EC2_HOSTS`,
//! authenticating with the key in `EC2_PEM_FILE`.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::Result;
use hostrun_core::{CoreError, Dispatcher, DispatchMode, HostSet, TaskTemplate, load_credential};
use hostrun_exec::{CredentialContext, SshProvider};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod output;

use config::{Config, LogFormat, Overrides};

#[derive(Parser)]
#[command(name = "hostrun", version)]
#[command(about = "Upload files to or run commands on a set of SSH hosts", long_about = None)]
struct Cli {
    /// Hosts as user@host,user@host,...
    #[arg(long, env = "EC2_HOSTS", global = true)]
    hosts: Option<String>,

    /// Private key used for every host
    #[arg(long, env = "EC2_PEM_FILE", global = true)]
    pem_file: Option<PathBuf>,

    /// Connect and authentication timeout per host, in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Whole-task timeout per host, in seconds (0 disables)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Cap on hosts handled at once with --is-async (0 = unbounded)
    #[arg(long, global = true)]
    max_parallel: Option<usize>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files to every host
    Upload {
        /// File to upload (repeatable)
        #[arg(short = 'f', long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Remote destination directory (defaults to the login directory)
        #[arg(short = 'd', long = "des")]
        des: Option<String>,

        /// Handle all hosts at once
        #[arg(long)]
        is_async: bool,
    },
    /// Run a shell command on every host
    Run {
        /// Command to run (repeatable, joined with "; ")
        #[arg(short = 'c', long = "command", required = true)]
        commands: Vec<String>,

        /// Handle all hosts at once
        #[arg(long)]
        is_async: bool,
    },
}

impl Cli {
    /// Hosts from `--hosts` or `EC2_HOSTS`
    fn host_set(&self) -> Result<HostSet, CoreError> {
        HostSet::parse(self.hosts.as_deref().unwrap_or_default())
    }

    /// Key from `--pem-file` or `EC2_PEM_FILE`
    fn credential(&self) -> Result<CredentialContext, CoreError> {
        load_credential(self.pem_file.clone().unwrap_or_default())
    }
}

impl Commands {
    fn mode(&self) -> DispatchMode {
        let is_async = match self {
            Commands::Upload { is_async, .. } | Commands::Run { is_async, .. } => *is_async,
        };
        if is_async {
            DispatchMode::Concurrent
        } else {
            DispatchMode::Sequential
        }
    }

    fn template(&self) -> Result<TaskTemplate, CoreError> {
        match self {
            Commands::Upload { files, des, .. } => {
                TaskTemplate::upload_many(files.iter().cloned(), des.clone())
            }
            Commands::Run { commands, .. } => TaskTemplate::run_many(commands.as_slice()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::load_default()?;

    init_tracing(cli.verbose, &config);
    debug!(source = ?config.source, "configuration loaded");

    // Everything below fails before any host is contacted
    let hosts = cli.host_set()?;
    let credential = cli.credential()?;
    let template = cli.command.template()?;

    let dispatch_config = config.dispatch_config(
        cli.command.mode(),
        Overrides {
            connect_timeout_secs: cli.connect_timeout,
            task_timeout_secs: cli.timeout,
            max_parallel: cli.max_parallel,
        },
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let dispatcher = Dispatcher::new(Arc::new(SshProvider::new()), credential, dispatch_config)
        .with_cancellation(cancel);
    let report = dispatcher.dispatch(&hosts, &template).await;

    let mut stdout = std::io::stdout().lock();
    if cli.json {
        output::render_json(&report, &mut stdout)?;
    } else {
        output::render_text(&report, &mut stdout)?;
    }
    stdout.flush()?;

    Ok(ExitCode::from(report.exit_code()))
}

/// Cancel dispatch on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, stopping dispatch");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt"),
        }
    });
}

/// Log to stderr; `RUST_LOG` wins over `-v`, which wins over the config file
fn init_tracing(verbose: u8, config: &Config) {
    let fallback = match verbose {
        0 => config.log.level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log.format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
