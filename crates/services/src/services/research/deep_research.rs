//! Deep Research Agent
//!
//! Turns the top trends of the latest snapshot into research briefs: up to
//! five heuristic claims and up to five follow-up questions per trend.

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::{
        research::{MAX_CLAIMS, MAX_FOLLOWUPS, ResearchBrief, ResearchBriefs},
        trend::{Trend, TrendSnapshot},
    },
};
use tracing::{info, warn};

use crate::services::{
    config::ResearchConfig,
    context::{StageContext, StageError, StageReport},
    trends::scoring::{contains_term, normalize_title},
};

const MAX_SENTENCE_CHARS: usize = 200;

/// First sentence of `text`, trimmed and bounded.
pub fn first_sentence(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let end = text
        .char_indices()
        .find(|(i, c)| {
            matches!(c, '.' | '!' | '?')
                && text[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_none_or(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());
    let sentence: String = text[..end].chars().take(MAX_SENTENCE_CHARS).collect();
    Some(sentence.trim().to_string())
}

fn any_marker(text: &str, markers: &[String]) -> bool {
    markers.iter().any(|m| contains_term(text, m))
}

/// Category inferred from the text, falling back to the source category.
pub fn infer_category(trend: &Trend, config: &ResearchConfig) -> String {
    let text = normalize_title(&format!("{} {}", trend.title, trend.summary));
    if any_marker(&text, &config.research_markers) {
        "research".to_string()
    } else {
        trend.category.to_lowercase()
    }
}

/// Claims in fixed order: topic, first sentence, attribution, category,
/// announcement-vs-research.
pub fn extract_claims(trend: &Trend, config: &ResearchConfig) -> Vec<String> {
    let text = normalize_title(&format!("{} {}", trend.title, trend.summary));
    let mut claims = vec![format!("Main topic: {}", trend.title)];

    if let Some(sentence) = first_sentence(&trend.summary) {
        if sentence != trend.title {
            claims.push(sentence);
        }
    }

    claims.push(format!("Reported by {}", trend.source));
    claims.push(format!(
        "Falls under {} coverage",
        infer_category(trend, config)
    ));

    if any_marker(&text, &config.announcement_markers) {
        claims.push("This is a product or release announcement".to_string());
    } else if any_marker(&text, &config.research_markers) {
        claims.push("This reports research findings".to_string());
    }

    claims.truncate(MAX_CLAIMS);
    claims
}

/// Category templates first, then `default`, deduplicated and capped.
pub fn followups(trend: &Trend, config: &ResearchConfig) -> Vec<String> {
    let category = infer_category(trend, config);
    let mut out: Vec<String> = Vec::new();
    let groups = [category.as_str(), trend.category.as_str(), "default"];
    for group in groups {
        let Some(templates) = config.followup_templates.get(group) else {
            continue;
        };
        for template in templates {
            let question = template.replace("{topic}", &trend.title);
            if !out.contains(&question) {
                out.push(question);
            }
        }
    }
    out.truncate(MAX_FOLLOWUPS);
    out
}

pub fn research(
    upstream: Upstream<TrendSnapshot>,
    config: &ResearchConfig,
) -> Artifact<ResearchBriefs> {
    let snapshot = match upstream {
        Upstream::Ready(snapshot) => snapshot,
        Upstream::Missing(reason) => {
            warn!("Research upstream missing: {}", reason);
            return Artifact::degraded(ResearchBriefs::default(), reason);
        }
    };

    if snapshot.payload.trends.is_empty() {
        let reason = match snapshot.degraded_reason.as_deref() {
            Some(upstream_reason) => format!("trend snapshot has no trends ({})", upstream_reason),
            None => "trend snapshot has no trends".to_string(),
        };
        return Artifact::degraded(ResearchBriefs::default(), reason)
            .with_source_ref(snapshot.id);
    }

    let briefs = snapshot
        .payload
        .trends
        .iter()
        .take(config.top_n)
        .map(|trend| ResearchBrief {
            title: trend.title.clone(),
            source: trend.source.clone(),
            link: trend.link.clone(),
            category: infer_category(trend, config),
            claims: extract_claims(trend, config),
            followups: followups(trend, config),
        })
        .collect::<Vec<_>>();

    info!("Researched {} trends", briefs.len());

    let status = match snapshot.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    let mut artifact = Artifact::new(ResearchBriefs { briefs }, status).with_source_ref(snapshot.id);
    if status == ArtifactStatus::Partial {
        artifact = artifact.with_reason(format!("upstream trend snapshot is {}", snapshot.status));
    }
    artifact
}

pub async fn run(ctx: &StageContext, config: &ResearchConfig) -> Result<StageReport, StageError> {
    let upstream = ctx.store.upstream::<TrendSnapshot>().await;
    let artifact = research(upstream, config);
    ctx.finish(&artifact).await
}
