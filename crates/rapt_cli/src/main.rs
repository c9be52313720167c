//! rapt CLI
//!
//! Run registered container tools as Kubernetes Jobs and inspect their runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod args;
mod progress;
mod render;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use console::style;
use progress::ConsoleObserver;
use rapt_cluster::KubePlatform;
use rapt_core::{EngineConfig, JobName};
use rapt_runtime::{LogOptions, MountSpec, RunRequest, ToolRunner};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const INTERRUPT_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "rapt")]
#[command(about = "Run containerized tools as Kubernetes Jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Namespace (defaults to the current kubeconfig context)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a tool as a Job
    Run {
        /// Tool name
        tool: String,
        /// Tool argument as key=value (repeatable)
        #[arg(short, long = "arg", value_parser = args::parse_key_val)]
        args: Vec<(String, String)>,
        /// Environment variable as key=value (repeatable)
        #[arg(short, long, value_parser = args::parse_key_val)]
        env: Vec<(String, String)>,
        /// Mount a local file as local:container (repeatable)
        #[arg(short, long)]
        mount: Vec<MountSpec>,
        /// Wait for the job to finish
        #[arg(short, long)]
        wait: bool,
        /// Stream job output while waiting (implies --wait)
        #[arg(short, long)]
        follow: bool,
        /// Seconds to wait for completion (0 = no limit)
        #[arg(short, long, default_value_t = 300)]
        timeout: u64,
        /// Pod readiness polls before giving up on logs
        #[arg(long, default_value_t = 30)]
        pod_attempts: u32,
        /// Milliseconds between pod readiness polls
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,
        /// Seconds a finished job is kept
        #[arg(long, default_value_t = 300)]
        ttl: i32,
    },
    /// List previous runs of a tool, or show the logs of one run
    Logs {
        /// Tool name
        tool: String,
        /// Job name (omit to list runs)
        job: Option<String>,
        /// Follow output
        #[arg(short, long)]
        follow: bool,
        /// Only the last N lines
        #[arg(short, long)]
        tail: Option<i64>,
    },
    /// Show a tool definition
    Describe {
        /// Tool name
        tool: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Output::Table)]
        output: Output,
    },
    /// List tools in the namespace
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Output::Table)]
        output: Output,
    },
    /// Delete mount ConfigMaps whose job no longer exists
    Gc {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
        /// Seconds a ConfigMap must exist before it may be deleted
        #[arg(long, default_value_t = 300)]
        min_age: u64,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rapt=debug" } else { "rapt=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = EngineConfig::new();
    if let Some(namespace) = &cli.namespace {
        config = config.with_namespace(namespace.clone());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    until_interrupted(execute(cli.command, config, cancel.clone()), &cancel).await
}

/// Drive `work` until it finishes or the token has been cancelled for
/// [`INTERRUPT_GRACE`]
///
/// Work that watches the token gets the grace period to stop on its own.
async fn until_interrupted<F>(work: F, cancel: &CancellationToken) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    tokio::select! {
        result = work => result,
        () = async {
            cancel.cancelled().await;
            tokio::time::sleep(INTERRUPT_GRACE).await;
        } => Err(eyre!("interrupted")),
    }
}

async fn execute(command: Commands, config: EngineConfig, cancel: CancellationToken) -> Result<()> {
    match command {
        Commands::Run {
            tool,
            args,
            env,
            mount,
            wait,
            follow,
            timeout,
            pod_attempts,
            poll_interval_ms,
            ttl,
        } => {
            let config = config
                .with_timeout_secs(timeout)
                .with_pod_max_attempts(pod_attempts)
                .with_poll_interval(Duration::from_millis(poll_interval_ms))
                .with_job_ttl(ttl);
            let runner = connect(config, cancel).await?;

            let tool_name = tool.clone();
            let mut request = RunRequest::new(tool)
                .with_wait(wait)
                .with_follow(follow);
            request.args = args::into_args(args);
            request.env = args::into_env(env);
            request.mounts = mount;

            let observer = Arc::new(ConsoleObserver::new(request.waits(), follow));
            let result = runner
                .run(request, observer.clone(), Box::new(tokio::io::stdout()))
                .await;
            observer.finish();

            match result {
                Ok(outcome) if outcome.state.is_terminal() => {
                    println!(
                        "{} {}",
                        style("✓").green(),
                        render::completion_line(outcome.handle.name.as_str(), outcome.state)
                    );
                }
                Ok(outcome) => {
                    println!(
                        "Check its output with: rapt logs {} {}",
                        tool_name, outcome.handle.name
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Logs {
            tool,
            job,
            follow,
            tail,
        } => {
            let runner = connect(config, cancel).await?;
            match job {
                None => {
                    let runs = runner.runs(&tool).await?;
                    if runs.is_empty() {
                        println!("No previous runs found for tool '{}'", tool);
                        return Ok(());
                    }
                    println!("Previous runs for tool '{}':\n", tool);
                    print!("{}", render::runs_table(&runs));
                    println!("\nTo view logs for a specific job, run:");
                    println!("  rapt logs {} <job-name>", tool);
                    println!("\nTo follow logs for the latest job, run:");
                    println!("  rapt logs {} {} --follow", tool, runs[0].job);
                }
                Some(job) => {
                    let options = LogOptions {
                        follow,
                        tail_lines: tail.filter(|n| *n > 0),
                    };
                    let mut stdout = tokio::io::stdout();
                    runner
                        .job_logs(&tool, &JobName::from_raw(job), options, &mut stdout, |record, pod| {
                            print!("{}", render::log_header(record, pod, follow));
                        })
                        .await?;
                }
            }
        }
        Commands::Describe { tool, output } => {
            let runner = connect(config, cancel).await?;
            let definition = runner.describe(&tool).await?;
            match output {
                Output::Table => print!("{}", render::tool_details(&definition)),
                Output::Json => println!("{}", serde_json::to_string_pretty(&definition)?),
            }
        }
        Commands::List { output } => {
            let runner = connect(config, cancel).await?;
            let tools = runner.list_tools().await?;
            match output {
                Output::Json => println!("{}", serde_json::to_string_pretty(&tools)?),
                Output::Table if tools.is_empty() => {
                    println!("No tools found in namespace '{}'.", runner.namespace());
                }
                Output::Table => print!("{}", render::tools_table(&tools)),
            }
        }
        Commands::Gc { dry_run, min_age } => {
            let config = config.with_gc_min_age(Duration::from_secs(min_age));
            let runner = connect(config, cancel).await?;
            let report = runner.gc(dry_run).await?;
            let verb = if dry_run { "Would delete" } else { "Deleted" };
            for blob in &report.deleted {
                println!("{} {}", verb, blob);
            }
            for (blob, reason) in &report.failed {
                eprintln!("{} {}: {}", style("failed:").red(), blob, reason);
            }
            println!(
                "{} {} orphaned mount blob(s), inspected {}, {} too recent",
                verb,
                report.deleted.len(),
                report.inspected,
                report.recent
            );
            if !report.failed.is_empty() {
                return Err(eyre!("{} blob(s) could not be deleted", report.failed.len()));
            }
        }
    }

    Ok(())
}

async fn connect(config: EngineConfig, cancel: CancellationToken) -> Result<ToolRunner> {
    let platform = KubePlatform::connect(config.namespace.clone()).await?;
    tracing::debug!(namespace = %rapt_runtime::Platform::namespace(&platform), "Connected");
    Ok(ToolRunner::new(Arc::new(platform), config).with_cancellation(cancel))
}
