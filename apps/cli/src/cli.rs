//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vizdiff", version, about = "Visual regression build uploader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload assets and HTML snapshots as one build.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Asset directory scanned for build resources (repeatable).
    #[arg(long = "assets", value_name = "DIR")]
    pub assets: Vec<PathBuf>,

    /// Leading path removed from resource URLs (repeatable).
    #[arg(long = "strip-prefix", value_name = "PREFIX")]
    pub strip_prefixes: Vec<String>,

    /// Named viewport width, e.g. `mobile=375` (repeatable).
    #[arg(long = "breakpoint", value_name = "NAME=WIDTH", value_parser = parse_breakpoint)]
    pub breakpoints: Vec<(String, u32)>,

    /// Directory of `*.html` files; each becomes one snapshot.
    #[arg(long, value_name = "DIR")]
    pub snapshots: PathBuf,

    /// Breakpoint names used for every snapshot. Defaults to all.
    #[arg(long, value_name = "NAME", value_delimiter = ',')]
    pub widths: Option<Vec<String>>,

    /// Render snapshots with JavaScript enabled.
    #[arg(long)]
    pub enable_javascript: bool,

    /// Wait for the diff results and fail on differences.
    #[arg(long)]
    pub report_results: bool,

    /// Verbose logging of the manifest and every upload.
    #[arg(long)]
    pub debug: bool,
}

fn parse_breakpoint(s: &str) -> Result<(String, u32), String> {
    let (name, width) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=WIDTH, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing breakpoint name in `{s}`"));
    }
    let width = width
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid width in `{s}`: {e}"))?;
    Ok((name.to_string(), width))
}
