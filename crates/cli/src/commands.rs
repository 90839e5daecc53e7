//! CLI subcommand handlers
//!
//! Every stage subcommand runs inside an `info_span!("stage", name)` and
//! prints its `StageReport`. Domain failures are already folded into the
//! report; only infrastructure errors reach the caller.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow};
use artifacts::{ArtifactKind, ArtifactStore, EventBus, schema::artifact_schema};
use services::services::{
    assets::{brief_builder, qa_gate as asset_qa},
    config::FactoryConfig,
    context::{StageContext, StageReport},
    production::{ffmpeg::FFmpegClient, qa_gate as production_qa, renderer},
    publish::{connectors::get_connector, metrics, packager, publisher},
    research::{competitor, deep_research},
    scripts::{generator, reviewer},
    trends,
};
use tracing::{Instrument, info_span, warn};
use utils::assets::events_dir;

use crate::output::OutputHandler;

/// Everything a stage subcommand needs, resolved once per process.
pub struct App {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: FactoryConfig,
    pub ctx: StageContext,
}

impl App {
    pub fn open(root: PathBuf, config_path: PathBuf) -> Result<Self> {
        let config = FactoryConfig::load(&config_path)
            .with_context(|| format!("invalid configuration at {}", config_path.display()))?;
        let store = ArtifactStore::new(&root).with_events(EventBus::new().with_spool(events_dir(&root)));
        Ok(Self {
            root,
            config_path,
            config,
            ctx: StageContext::new(store),
        })
    }
}

/// The pipeline stages, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Trends,
    Research,
    Competitors,
    Scripts,
    Review,
    AssetBriefs,
    AssetQa,
    Render,
    ProductionQa,
    Package,
    Publish { platform: String },
    Metrics,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Trends => "trends",
            Stage::Research => "research",
            Stage::Competitors => "competitors",
            Stage::Scripts => "scripts",
            Stage::Review => "review",
            Stage::AssetBriefs => "asset-briefs",
            Stage::AssetQa => "asset-qa",
            Stage::Render => "render",
            Stage::ProductionQa => "production-qa",
            Stage::Package => "package",
            Stage::Publish { .. } => "publish",
            Stage::Metrics => "metrics",
        }
    }
}

async fn execute(app: &App, stage: &Stage) -> Result<StageReport> {
    let ctx = &app.ctx;
    let config = &app.config;
    let report = match stage {
        Stage::Trends => {
            let sources = trends::build_sources(
                &config.trends.sources,
                Duration::from_secs(config.trends.fetch_timeout_secs),
            );
            trends::run(ctx, &config.trends, &sources).await?
        }
        Stage::Research => deep_research::run(ctx, &config.research).await?,
        Stage::Competitors => competitor::run(ctx, &config.competitors).await?,
        Stage::Scripts => generator::run(ctx, &config.scripts).await?,
        Stage::Review => reviewer::run(ctx, &config.review).await?,
        Stage::AssetBriefs => brief_builder::run(ctx, &config.assets).await?,
        Stage::AssetQa => asset_qa::run(ctx, &config.assets).await?,
        Stage::Render => {
            let ffmpeg = FFmpegClient::from_config(&config.production);
            renderer::run(ctx, &config.production, &ffmpeg, &ffmpeg).await?
        }
        Stage::ProductionQa => {
            let ffmpeg = FFmpegClient::from_config(&config.production);
            production_qa::run(ctx, &config.production, &ffmpeg).await?
        }
        Stage::Package => packager::run(ctx, &config.publish).await?,
        Stage::Publish { platform } => {
            let connector = match get_connector(platform, &config.publish) {
                Ok(connector) => Some(connector),
                Err(e) => {
                    warn!("{}; live publishes will be recorded as failed", e);
                    None
                }
            };
            publisher::run(ctx, platform, &config.publish, connector.as_deref()).await?
        }
        Stage::Metrics => metrics::run(ctx, &config.publish).await?,
    };
    Ok(report)
}

/// Run one stage and print its report
pub async fn run_stage(app: &App, stage: Stage, output: &OutputHandler) -> Result<()> {
    let name = stage.name();
    let report = execute(app, &stage)
        .instrument(info_span!("stage", name))
        .await
        .with_context(|| format!("stage {} could not complete", name))?;
    output.print_report(&report)
}

/// Print the JSON Schema of one artifact kind
pub fn show_schema(kind: &str, output: &OutputHandler) -> Result<()> {
    let kind = ArtifactKind::from_name(kind).ok_or_else(|| {
        let known: Vec<&str> = ArtifactKind::ALL.iter().map(|k| k.dir()).collect();
        anyhow!("unknown artifact kind '{}' (known: {})", kind, known.join(", "))
    })?;
    output.print_json(&artifact_schema(kind))
}

/// Print the effective configuration as TOML
pub fn show_config(app: &App, output: &OutputHandler) -> Result<()> {
    let source = if app.config_path.exists() {
        app.config_path.display().to_string()
    } else {
        format!("{} (absent, defaults)", app.config_path.display())
    };
    output.print_text(&format!("# factory root: {}\n# config: {}\n", app.root.display(), source));
    output.print_text(&app.config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_schema_kind_is_an_error() {
        let output = OutputHandler::new(true);
        assert!(show_schema("nonsense", &output).is_err());
    }

    #[test]
    fn invalid_config_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[review]\napprove_threshold = 3\nreject_threshold = 5\n").unwrap();
        assert!(App::open(dir.path().to_path_buf(), path).is_err());
    }

    #[tokio::test]
    async fn metrics_runs_against_an_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(dir.path().to_path_buf(), dir.path().join("config.toml")).unwrap();
        let report = execute(&app, &Stage::Metrics).await.unwrap();
        assert!(report.wrote_artifact());
    }
}
