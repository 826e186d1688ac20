//! Kubernetes provisioning CLI.
//!
//! Installs a single-node Kubernetes cluster plus the Prometheus/Grafana
//! monitoring stack on every host given on the command line and writes a
//! status record per host.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use provisioner::{ui, FileStatusStore, FleetDriver, PhaseContext, ProvisionConfig, SshExecutor};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Provision Kubernetes and monitoring on remote hosts over SSH.
#[derive(Parser)]
#[command(
    name = "k8s-setup",
    version,
    about = "Provision Kubernetes and a monitoring stack over SSH",
    long_about = "Provision Kubernetes and a monitoring stack over SSH.\n\n\
                  Every host runs through requirement checks, cluster installation,\n\
                  monitoring installation, verification and backup. Progress for\n\
                  each host is written to <status-dir>/<host>.json.\n\n\
                  Re-running after a partial failure is not guaranteed to be safe."
)]
struct Cli {
    /// Configuration file (JSON, or YAML by extension).
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Host addresses to provision.
    #[arg(value_name = "HOST", required = true, num_args = 1..)]
    hosts: Vec<String>,

    /// Directory for per-host status records.
    #[arg(long, value_name = "DIR", default_value = "status")]
    status_dir: PathBuf,

    /// Directory for transient rendered documents.
    #[arg(long, value_name = "DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Number of hosts provisioned at once.
    #[arg(long, value_name = "N", default_value_t = 1)]
    concurrency: usize,

    /// Exit with status 1 if any host fails.
    #[arg(long)]
    fail_on_host_error: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,provisioner=debug")
        } else {
            EnvFilter::new("warn,provisioner=info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config = ProvisionConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    ui::print_section("Kubernetes Provisioning");
    ui::print_info(&format!("Hosts: {}", cli.hosts.join(", ")));
    ui::print_info(&format!("Status directory: {}", cli.status_dir.display()));

    let driver = FleetDriver::new(
        Arc::new(SshExecutor::new()),
        Arc::new(FileStatusStore::new(&cli.status_dir)),
        PhaseContext::new(Arc::new(config), &cli.work_dir),
    )
    .with_concurrency(cli.concurrency);

    let report = driver.run(&cli.hosts).await;
    ui::print_summary(&report.records);

    if report.has_failures() {
        ui::print_info(&format!(
            "{} of {} hosts failed. See {} for details.",
            report.failed(),
            report.records.len(),
            cli.status_dir.display()
        ));
        if cli.fail_on_host_error {
            std::process::exit(1);
        }
    }

    Ok(())
}
