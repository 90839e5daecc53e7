//! Trend Detector
//!
//! Polls every configured source, dedups by normalized-title hash, scores the
//! survivors and keeps the top N. Never fails on source errors: a run with no
//! working source still writes a valid (degraded, empty) snapshot.

pub mod scoring;
pub mod sources;

use std::collections::HashSet;

use artifacts::{
    Artifact, ArtifactStatus,
    models::trend::{SourceState, SourceStatus, Trend, TrendSnapshot},
};
use tracing::{info, warn};

pub use sources::{FeedItem, JsonFeedSource, SourceError, TrendSource, build_sources};

use super::{
    config::TrendsConfig,
    context::{StageContext, StageError, StageReport},
};

/// Poll, dedup, score and rank. Pure apart from the source I/O.
pub async fn detect(config: &TrendsConfig, sources: &[Box<dyn TrendSource>]) -> Artifact<TrendSnapshot> {
    let mut snapshot = TrendSnapshot::default();
    let mut seen = HashSet::new();

    for source in sources {
        match source.fetch().await {
            Ok(items) => {
                let fetched = items.len();
                for item in items {
                    if item.title.trim().is_empty() || !seen.insert(scoring::title_key(&item.title)) {
                        continue;
                    }
                    let score = scoring::score(&item.title, &item.summary, source.category(), config);
                    snapshot.trends.push(Trend {
                        title: item.title.trim().to_string(),
                        link: item.link,
                        source: source.name().to_string(),
                        category: source.category().to_string(),
                        score,
                        summary: item.summary,
                    });
                }
                info!("Source {} yielded {} items", source.name(), fetched);
                snapshot.sources.push(SourceStatus {
                    name: source.name().to_string(),
                    status: SourceState::Ok,
                    items: fetched,
                    error: None,
                });
            }
            Err(e) => {
                warn!("Source {} failed: {}", source.name(), e);
                snapshot.sources.push(SourceStatus {
                    name: source.name().to_string(),
                    status: SourceState::Error,
                    items: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    // Stable: equal scores keep source order
    snapshot
        .trends
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    snapshot.trends.truncate(config.top_n);

    let ok = snapshot.sources_ok();
    let failed = snapshot.sources_failed();
    if sources.is_empty() {
        Artifact::degraded(snapshot, "no trend sources configured")
    } else if ok == 0 {
        Artifact::degraded(snapshot, format!("all {} sources failed", failed))
    } else if failed > 0 {
        Artifact::new(snapshot, ArtifactStatus::Partial)
            .with_reason(format!("{} of {} sources failed", failed, ok + failed))
    } else {
        Artifact::new(snapshot, ArtifactStatus::Healthy)
    }
}

pub async fn run(
    ctx: &StageContext,
    config: &TrendsConfig,
    sources: &[Box<dyn TrendSource>],
) -> Result<StageReport, StageError> {
    let artifact = detect(config, sources).await;
    ctx.finish(&artifact).await
}
