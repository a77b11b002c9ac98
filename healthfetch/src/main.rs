use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use device_probe::{EndpointProber, FetchOrchestrator, HttpTransport};
use healthfetch_core::FetchSession;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use targets::TargetSetBuilder;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod report;

use config::{FallbackMode, FetchSettings};
use report::{OutputMode, ReportSink, SummaryCsv, Tally};

#[derive(Debug, Parser)]
#[command(name = "healthfetch", version, about = "Fetch health and hardware data from generation-1 (port 443) and generation-2 (port 8888) devices")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./healthfetch.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log verbosity on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Probe devices and report what each one returned
    Fetch(FetchArgs),
}

#[derive(Debug, Default, Args)]
pub struct FetchArgs {
    /// Single IP address or CIDR range (e.g., 192.168.1.0/24)
    pub target: Option<String>,
    /// File with newline-delimited addresses or ranges (comments with # and blanks ignored)
    #[arg(long, value_name = "FILE")]
    pub targets: Option<PathBuf>,
    /// Timeout per request in seconds [default: 3]
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Max devices probed concurrently [default: 10]
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Where results go [default: console]
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    /// Directory for per-device YAML files (files output) [default: .]
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
    /// Also write a one-row-per-device CSV summary
    #[arg(long, value_name = "FILE")]
    pub summary_csv: Option<PathBuf>,
    /// Which port 8888 failures move on to port 443 [default: timeout-only]
    #[arg(long, value_enum)]
    pub fallback: Option<FallbackMode>,
    /// Basic auth user [default: admin]
    #[arg(long)]
    pub username: Option<String>,
    /// Basic auth password [default: admin]
    #[arg(long)]
    pub password: Option<String>,
    /// Bearer token; replaces basic auth when set
    #[arg(long)]
    pub token: Option<String>,
    /// Verify device TLS certificates
    #[arg(long, default_value_t = false)]
    pub verify_tls: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("healthfetch {} (core {})", env!("CARGO_PKG_VERSION"), healthfetch_core::version());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fetch(args) => {
            let cfg = loaded_cfg.and_then(|c| c.fetch).unwrap_or_default();
            let settings = FetchSettings::resolve(args, &cfg)?;
            run_fetch(settings)
        }
    }
}

fn run_fetch(settings: FetchSettings) -> Result<ExitCode> {
    let mut builder = TargetSetBuilder::new();
    if let Some(t) = &settings.target {
        builder.add_spec(t)?;
    }
    if let Some(path) = &settings.targets_file {
        builder.add_file(path)?;
    }
    if settings.target.is_none() && settings.targets_file.is_none() {
        return Err(anyhow!("provide a target or --targets <file>"));
    }
    info!(targets = builder.len(), "target set ready");
    let targets = builder.build()?;
    let session = FetchSession::new(targets)
        .with_timeout(settings.timeout)
        .with_concurrency(settings.concurrency);

    let transport = HttpTransport::new(&settings.http)?;
    let prober = EndpointProber::new(transport, session.timeout()).with_policy(settings.fallback);
    info!(fallback = ?prober.policy(), timeout_ms = session.timeout().as_millis() as u64, "prober ready");
    let orchestrator = FetchOrchestrator::new(prober);

    let stdout = io::stdout();
    let mut sink = ReportSink::new(settings.output, settings.out_dir.clone(), stdout.lock())?;
    let mut summary = match &settings.summary_csv {
        Some(path) => Some(SummaryCsv::create(path)?),
        None => None,
    };
    sink.announce(&session)?;

    let rt = tokio::runtime::Runtime::new()?;
    let started = Instant::now();
    let tally = rt.block_on(async {
        let mut rx = orchestrator.dispatch(&session);
        let mut tally = Tally::default();
        while let Some(outcome) = rx.recv().await {
            tally.record(&outcome);
            // a failing report for one device must not hide the others
            if let Err(e) = sink.emit(&outcome) {
                error!(address = %outcome.address(), error = %e, "failed to report outcome");
                tally.report_errors += 1;
            }
            if let Some(csv) = summary.as_mut() {
                if let Err(e) = csv.record(&outcome) {
                    error!(address = %outcome.address(), error = %e, "failed to write summary row");
                    tally.report_errors += 1;
                }
            }
        }
        tally
    });
    let duration_ms = started.elapsed().as_millis();

    sink.finish(&tally, duration_ms)?;
    if let Some(csv) = summary {
        csv.finish()?;
    }
    info!(
        success = tally.success,
        timeout = tally.timeout,
        error = tally.error,
        duration_ms = duration_ms as u64,
        "run finished"
    );

    Ok(if tally.all_ok() { ExitCode::SUCCESS } else { ExitCode::from(2) })
}
