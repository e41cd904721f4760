//! # vizdiff
//!
//! Uploads a static site's assets and HTML snapshots as one visual
//! regression build.
//!
//! ```bash
//! vizdiff run --assets public --strip-prefix public \
//!     --breakpoint mobile=375 --breakpoint desktop=1280 \
//!     --snapshots snapshots --report-results
//! ```
//!
//! Credentials come from `VIZDIFF_TOKEN` and `VIZDIFF_PROJECT`; without
//! them, or with `VIZDIFF_ENABLE=0`, the run is a no-op.

mod cli;
mod gateway_adapter;
mod pages;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vizdiff_build::{
    BreakpointRegistry, BuildOutcome, BuildSession, SetupOptions, SnapshotRequest,
};
use vizdiff_client::{Client, ClientConfig};

use cli::{Cli, Command, RunArgs};
use gateway_adapter::ClientGateway;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;

    let default_filter = if args.debug { "info,vizdiff=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(args).await {
        Ok(outcome) if outcome.is_failure() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<BuildOutcome> {
    let pages = pages::collect(&args.snapshots)?;
    let config = ClientConfig::from_env();

    let session = match Client::from_config(&config)? {
        Some(client) => {
            let gateway = Arc::new(ClientGateway::new(client, config.branch.clone()));
            let options = SetupOptions {
                asset_dirs: args.assets,
                strip_prefixes: args.strip_prefixes,
                breakpoints: BreakpointRegistry::new(args.breakpoints),
                debug: args.debug,
            };
            BuildSession::setup(gateway, options)?
        }
        None => {
            warn!("vizdiff disabled: VIZDIFF_TOKEN/VIZDIFF_PROJECT not set or VIZDIFF_ENABLE=0");
            BuildSession::disabled()
        }
    };

    info!(pages = pages.len(), "queueing snapshots");
    for page in pages {
        let mut request =
            SnapshotRequest::new(page.name, page.html).with_javascript(args.enable_javascript);
        if let Some(widths) = &args.widths {
            request = request.with_breakpoints(widths.iter().cloned());
        }
        session.snapshot(request);
    }

    let outcome = session.finalize_build(args.report_results).await?;
    match &outcome {
        BuildOutcome::DiffsFound { count, report_url } => {
            warn!(diffs = count, url = %report_url, "visual differences need review");
        }
        BuildOutcome::Failed { reason } => warn!(reason = %reason, "build failed"),
        BuildOutcome::NoDiffs => info!("no visual differences"),
        BuildOutcome::NotRequested | BuildOutcome::Skipped => {}
    }
    Ok(outcome)
}
