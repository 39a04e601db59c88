//! rowpipe CLI - streaming database-to-database ETL.

use clap::{Parser, Subcommand};
use rowpipe::{
    connect_source, connect_target, placeholder_style, select_jobs, Config, EtlError, JobRunner,
    RunSummary, WriteStatement,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "rowpipe")]
#[command(about = "Streaming database-to-database ETL with runtime schema discovery")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured jobs
    Run {
        /// Only run this job (repeatable, default: all jobs in order)
        #[arg(long = "job", value_name = "NAME")]
        jobs: Vec<String>,

        /// Dry run: validate config and write statements without connecting
        #[arg(long)]
        dry_run: bool,
    },

    /// Test database connections
    HealthCheck,

    /// Create an address table in the source database and fill it with dummy rows
    Seed {
        /// Number of rows to generate
        #[arg(long, default_value = "1000")]
        rows: usize,

        /// Table to create and fill
        #[arg(long, default_value = "addresses")]
        table: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), EtlError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { jobs, dry_run } => {
            let jobs = select_jobs(&config.jobs, &jobs)?;

            if dry_run {
                let style = placeholder_style(config.target.db_type);
                println!("Dry run: {} job(s) for {}", jobs.len(), config.target.db_type);
                for job in &jobs {
                    let statement =
                        WriteStatement::parse(&job.write, style, config.loader.column_case)
                            .map_err(|e| EtlError::Config(format!("job '{}': {}", job.name, e)))?;
                    println!("  {}", job.name);
                    println!("    extract: {}", job.extract);
                    println!("    write:   {}", statement.sql());
                    if !statement.parameters().is_empty() {
                        println!("    binds:   {}", statement.parameters().join(", "));
                    }
                }
                return Ok(());
            }

            let cancel_token = setup_signal_handler();
            let source = connect_source(&config.source).await?;
            let target = connect_target(&config.target).await?;
            let runner = JobRunner::new(source, target, config.loader.clone());

            let result = runner.run(&jobs, &cancel_token).await;
            runner.close().await;
            print_summary(&result?, cli.output_json, "Run completed!")?;
        }

        Commands::HealthCheck => {
            let source = connect_source(&config.source).await?;
            let target = connect_target(&config.target).await?;
            let runner = JobRunner::new(source, target, config.loader.clone());
            let result = runner.health_check().await;
            runner.close().await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.db_type,
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    config.target.db_type,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(EtlError::Config("Health check failed".to_string()));
            }
        }

        Commands::Seed { rows, table } => {
            let cancel_token = setup_signal_handler();
            let result =
                rowpipe::seed::seed(&config.source, config.loader.clone(), rows, &table, &cancel_token)
                    .await?;
            print_summary(&result, cli.output_json, "Seed completed!")?;
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool, status: &str) -> Result<(), EtlError> {
    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("\n{}", status);
    println!("  Duration: {:.2}s", summary.elapsed_secs);
    println!("  Rows: {}", summary.total_rows);
    for job in &summary.jobs {
        println!(
            "  {}: {} sent, {} received, {} batches in {:.2}s",
            job.name, job.rows_sent, job.rows_received, job.batches, job.elapsed_secs
        );
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    watch_signal(SignalKind::interrupt(), "SIGINT", cancel_token.clone());
    watch_signal(SignalKind::terminate(), "SIGTERM", cancel_token.clone());
    cancel_token
}

#[cfg(unix)]
fn watch_signal(kind: SignalKind, name: &'static str, token: CancellationToken) {
    tokio::spawn(async move {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                eprintln!("\nReceived {}. Shutting down...", name);
                token.cancel();
            }
            Err(e) => warn!("Failed to install {} handler: {}", name, e),
        }
    });
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Shutting down...");
                token.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
