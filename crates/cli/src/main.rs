//! SKYBEAM CLI - run one content-factory stage per invocation
//!
//! Each subcommand resolves its upstream artifacts from the factory root,
//! writes at most one new artifact and prints a JSON `StageReport`. A
//! scheduler (cron, systemd timers) is expected to drive the cadence.

mod commands;
mod output;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use crate::{
    commands::{App, Stage},
    output::OutputHandler,
};

/// SKYBEAM - autonomous short-form video content factory
#[derive(Parser)]
#[command(name = "skybeam")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run one stage of the SKYBEAM content pipeline")]
#[command(long_about = r#"
Run one stage of the SKYBEAM content pipeline against a factory root.

Stages hand off through JSON artifacts under the root; each invocation reads
the latest upstream artifact and writes one new artifact.

Examples:
  skybeam trends                       # Poll trend sources
  skybeam render                       # Render approved asset briefs
  skybeam publish --platform youtube   # Publish packaged masters
  skybeam schema receipt               # JSON Schema of a receipt artifact
"#)]
struct Cli {
    /// Factory root (defaults to the platform data directory)
    #[arg(long, env = "SKYBEAM_HOME", global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to <root>/config.toml)
    #[arg(long, env = "SKYBEAM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Suppress the human summary line on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll trend sources into a scored snapshot
    Trends,

    /// Turn the latest trends into research briefs
    Research,

    /// Match research briefs against known competitors
    Competitors,

    /// Generate scripts from research and competitor analysis
    Scripts,

    /// Score and gate the latest scripts
    Review,

    /// Build asset briefs for approved scripts
    AssetBriefs,

    /// Run the asset QA gate
    AssetQa,

    /// Render masters for approved asset briefs
    Render,

    /// Run the production QA gate over rendered masters
    ProductionQa,

    /// Package approved masters for publishing
    Package,

    /// Publish packaged masters to one platform
    Publish {
        /// Platform name (e.g. youtube)
        #[arg(short, long)]
        platform: String,
    },

    /// Snapshot receipt and queue metrics
    Metrics,

    /// Print the JSON Schema of an artifact kind
    Schema {
        /// Artifact kind (e.g. trend_snapshot, receipt, publish/packages)
        kind: String,
    },

    /// Show the effective configuration
    Config,
}

impl Commands {
    fn stage(self) -> Option<Stage> {
        Some(match self {
            Commands::Trends => Stage::Trends,
            Commands::Research => Stage::Research,
            Commands::Competitors => Stage::Competitors,
            Commands::Scripts => Stage::Scripts,
            Commands::Review => Stage::Review,
            Commands::AssetBriefs => Stage::AssetBriefs,
            Commands::AssetQa => Stage::AssetQa,
            Commands::Render => Stage::Render,
            Commands::ProductionQa => Stage::ProductionQa,
            Commands::Package => Stage::Package,
            Commands::Publish { platform } => Stage::Publish { platform },
            Commands::Metrics => Stage::Metrics,
            Commands::Schema { .. } | Commands::Config => return None,
        })
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = OutputHandler::new(cli.quiet);

    if let Commands::Schema { kind } = &cli.command {
        return commands::show_schema(kind, &output);
    }

    let root = utils::assets::factory_dir(cli.root.as_deref()).context("cannot prepare factory root")?;
    let config_path = utils::assets::config_path(&root, cli.config.as_deref());
    let app = App::open(root, config_path)?;

    match cli.command.stage() {
        Some(stage) => commands::run_stage(&app, stage, &output).await,
        None => commands::show_config(&app, &output),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    utils::logging::init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn publish_requires_a_platform() {
        assert!(Cli::try_parse_from(["skybeam", "publish"]).is_err());
        let cli = Cli::try_parse_from(["skybeam", "publish", "--platform", "youtube"]).unwrap();
        assert_eq!(
            cli.command.stage(),
            Some(Stage::Publish {
                platform: "youtube".to_string()
            })
        );
    }
}
