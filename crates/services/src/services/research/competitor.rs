//! Competitor Analyzer
//!
//! Scores every known competitor against each researched trend and derives
//! differentiation angles from the house strengths the likely competitors
//! do not cover.

use std::collections::BTreeSet;

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::{
        competitor::{
            CompetitorAnalysis, CompetitorMatch, Likelihood, MAX_COMPETITORS_PER_TREND,
            TrendCompetition,
        },
        research::{ResearchBrief, ResearchBriefs},
    },
};
use tracing::{info, warn};

use crate::services::{
    config::{CompetitorProfile, CompetitorsConfig},
    context::{StageContext, StageError, StageReport},
    trends::scoring::{contains_term, normalize_title},
};

const CATEGORY_AFFINITY: u32 = 2;

/// Category affinity plus one point per keyword found in the brief.
pub fn score_competitor(brief: &ResearchBrief, competitor: &CompetitorProfile) -> u32 {
    let text = normalize_title(&format!("{} {}", brief.title, brief.claims.join(" ")));
    let affinity = if competitor
        .categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(&brief.category))
    {
        CATEGORY_AFFINITY
    } else {
        0
    };
    let overlap = competitor
        .keywords
        .iter()
        .filter(|k| contains_term(&text, k))
        .count() as u32;
    affinity + overlap
}

pub fn likelihood(score: u32) -> Likelihood {
    match score {
        s if s >= 3 => Likelihood::High,
        s if s >= 1 => Likelihood::Medium,
        _ => Likelihood::Low,
    }
}

/// House strengths not covered by any high/medium competitor, phrased as
/// angles. Falls back to a fixed angle when every strength is contested.
pub fn differentiation(matches: &[CompetitorMatch], config: &CompetitorsConfig) -> Vec<String> {
    let contested: BTreeSet<&str> = matches
        .iter()
        .filter(|m| m.likelihood != Likelihood::Low)
        .filter_map(|m| config.competitors.iter().find(|c| c.name == m.competitor_name))
        .flat_map(|c| c.strengths.iter().map(String::as_str))
        .collect();

    let angles: Vec<String> = config
        .strengths
        .iter()
        .filter(|s| !contested.contains(s.as_str()))
        .map(|s| {
            config
                .strength_angles
                .get(s)
                .cloned()
                .unwrap_or_else(|| format!("Lean on {}", s.replace('_', " ")))
        })
        .collect();

    if angles.is_empty() {
        vec![config.fallback_angle.clone()]
    } else {
        angles
    }
}

pub fn analyze_brief(brief: &ResearchBrief, config: &CompetitorsConfig) -> TrendCompetition {
    let mut matches: Vec<CompetitorMatch> = config
        .competitors
        .iter()
        .map(|competitor| {
            let score = score_competitor(brief, competitor);
            CompetitorMatch {
                competitor_name: competitor.name.clone(),
                likelihood: likelihood(score),
                predicted_angle: competitor.default_angle.clone(),
                score,
            }
        })
        .collect();

    // Stable: equal rank keeps declaration order
    matches.sort_by(|a, b| a.likelihood.cmp(&b.likelihood).then(b.score.cmp(&a.score)));
    matches.truncate(MAX_COMPETITORS_PER_TREND);

    TrendCompetition {
        trend_title: brief.title.clone(),
        category: brief.category.clone(),
        differentiation: differentiation(&matches, config),
        competitors: matches,
    }
}

pub fn analyze(
    upstream: Upstream<ResearchBriefs>,
    config: &CompetitorsConfig,
) -> Artifact<CompetitorAnalysis> {
    let research = match upstream {
        Upstream::Ready(research) => research,
        Upstream::Missing(reason) => {
            warn!("Competitor upstream missing: {}", reason);
            return Artifact::degraded(CompetitorAnalysis::default(), reason);
        }
    };

    if research.payload.briefs.is_empty() {
        return Artifact::degraded(CompetitorAnalysis::default(), "no research briefs to analyze")
            .with_source_ref(research.id);
    }

    let analyses: Vec<TrendCompetition> = research
        .payload
        .briefs
        .iter()
        .map(|brief| analyze_brief(brief, config))
        .collect();
    info!("Analyzed competition for {} trends", analyses.len());

    let status = match research.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    Artifact::new(CompetitorAnalysis { analyses }, status).with_source_ref(research.id)
}

pub async fn run(ctx: &StageContext, config: &CompetitorsConfig) -> Result<StageReport, StageError> {
    let upstream = ctx.store.upstream::<ResearchBriefs>().await;
    let artifact = analyze(upstream, config);
    ctx.finish(&artifact).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief(title: &str, category: &str) -> ResearchBrief {
        ResearchBrief {
            title: title.to_string(),
            source: "wire".to_string(),
            link: String::new(),
            category: category.to_string(),
            claims: vec![format!("Main topic: {}", title)],
            followups: vec![],
        }
    }

    #[test]
    fn likelihood_bands() {
        assert_eq!(likelihood(0), Likelihood::Low);
        assert_eq!(likelihood(1), Likelihood::Medium);
        assert_eq!(likelihood(2), Likelihood::Medium);
        assert_eq!(likelihood(3), Likelihood::High);
    }

    #[test]
    fn ranking_is_capped_and_ordered() {
        let config = CompetitorsConfig::default();
        let analysis = analyze_brief(&brief("New research paper on neural model", "research"), &config);

        assert_eq!(analysis.competitors.len(), MAX_COMPETITORS_PER_TREND);
        assert_eq!(analysis.competitors[0].competitor_name, "PaperMinute");
        assert_eq!(analysis.competitors[0].likelihood, Likelihood::High);
        assert!(
            analysis
                .competitors
                .windows(2)
                .all(|p| p[0].likelihood <= p[1].likelihood)
        );
    }

    #[test]
    fn differentiation_drops_contested_strengths() {
        let config = CompetitorsConfig::default();
        // PaperMinute owns technical_depth for research topics
        let analysis = analyze_brief(&brief("New research paper on neural model", "research"), &config);
        let depth_angle = &config.strength_angles["technical_depth"];
        assert!(!analysis.differentiation.contains(depth_angle));
        assert!(!analysis.differentiation.is_empty());
    }

    #[test]
    fn fallback_angle_when_everything_is_contested() {
        let config = CompetitorsConfig {
            strengths: vec!["speed".to_string()],
            ..CompetitorsConfig::default()
        };
        let analysis = analyze_brief(&brief("Framework launch", "tech"), &config);
        assert_eq!(analysis.differentiation, vec![config.fallback_angle.clone()]);
    }

    #[test]
    fn missing_research_degrades() {
        let artifact = analyze(
            Upstream::Missing("no research artifact yet".into()),
            &CompetitorsConfig::default(),
        );
        assert_eq!(artifact.status, ArtifactStatus::Degraded);
        artifact.validate().unwrap();
    }
}
