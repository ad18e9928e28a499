//! compliance-report - files compliance profile results with the reporting server
//!
//! Exit codes:
//! - 0: report done (submission failures are logged unless raised by policy)
//! - 1: run aborted by policy (failed audits, or unreachable server when raising)
//! - 2: malformed local results or invalid configuration

use anyhow::{Context, Result};
use clap::Parser;
use compliance_report::{
    ComplianceProfile, HttpTransport, ReportError, Reporter, ReporterConfig, RunSummary, SystemHost,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Aggregate compliance profile results and submit them as one report
#[derive(Parser, Debug)]
#[command(name = "compliance-report", version)]
struct Cli {
    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `{owner}_{profile}.json` result files
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Profile to report on, as `owner/name` or `name` (repeatable)
    #[arg(long = "profile", value_name = "PROFILE")]
    profiles: Vec<String>,

    /// Node name to report instead of the hostname
    #[arg(long)]
    node: Option<String>,

    /// Environment to report instead of the configured one
    #[arg(long)]
    environment: Option<String>,

    /// Abort when any audit failed
    #[arg(long)]
    fail_if_any_failed: bool,

    /// Abort when the report cannot be saved
    #[arg(long)]
    raise_if_unreachable: bool,

    /// Verify the server TLS certificate
    #[arg(long)]
    verify_tls: bool,

    /// Save TOKEN to the OS keyring and exit
    #[arg(long, value_name = "TOKEN")]
    store_token: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "compliance_report=debug"
    } else {
        "compliance_report=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli).await {
        Ok(Some(summary)) => {
            info!(
                "Compliance report done: {} profile(s), {} failed audit(s){}",
                summary.profiles_reported,
                summary.total_failed,
                if summary.saved() { "" } else { ", report not saved" }
            );
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<ReportError>() {
                Some(ReportError::PolicyViolation { .. }) | Some(ReportError::Submission(_)) => {
                    ExitCode::from(1)
                }
                _ => ExitCode::from(2),
            }
        }
    }
}

async fn run(cli: Cli) -> Result<Option<RunSummary>> {
    if let Some(token) = &cli.store_token {
        ReporterConfig::save_token(token).context("Failed to store token")?;
        info!("Token stored in OS keyring");
        return Ok(None);
    }

    let mut config = ReporterConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    if let Some(dir) = cli.results_dir {
        config.results_dir = dir;
    }
    if cli.node.is_some() {
        config.node = cli.node;
    }
    if cli.environment.is_some() {
        config.environment = cli.environment;
    }
    config.policy.fail_if_any_failed |= cli.fail_if_any_failed;
    config.policy.raise_if_unreachable |= cli.raise_if_unreachable;
    config.verify_tls |= cli.verify_tls;

    let mut profiles = config.profile_refs();
    profiles.extend(
        cli.profiles
            .iter()
            .map(|name| ComplianceProfile::new(name, None, &config.results_dir)),
    );
    if profiles.is_empty() {
        warn!("No profiles configured, submitting an empty report");
    }

    if !config.verify_tls {
        warn!("TLS certificate verification is disabled for report submission");
    }

    let transport = HttpTransport::new(
        config.credentials(),
        config.verify_tls,
        Duration::from_secs(config.timeout_secs),
    )
    .context("Failed to build HTTP client")?;

    let host = SystemHost::discover(config.environment.clone());
    let reporter = Reporter::new(config, transport).context("Invalid reporting endpoint")?;
    info!("Reporting to {} (policy: {:?})", reporter.endpoint(), reporter.policy());

    let summary = reporter
        .execute(&profiles, &host)
        .await
        .context("Compliance report aborted")?;

    Ok(Some(summary))
}
