//! Script Reviewer
//!
//! Four independent 1-10 heuristics (hook, depth, flow, differentiation),
//! an integer-average overall, and a verdict from two thresholds. Sections
//! still holding a bare placeholder are flagged for revision.

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::script::{
        ReviewResult, ReviewScores, ReviewStatus, ReviewedScript, ReviewedScripts, Script,
        ScriptBatch,
    },
};
use tracing::{info, warn};

use crate::services::{
    config::ReviewConfig,
    context::{StageContext, StageError, StageReport},
    trends::scoring::{contains_term, normalize_title},
};

const MIN_SCORE: u32 = 1;
const MAX_SCORE: u32 = 10;

fn clamp(score: u32) -> u8 {
    score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

/// Content with a leading `[TAG]` removed.
pub fn strip_tag(content: &str) -> &str {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find(']') {
            return trimmed[end + 1..].trim();
        }
    }
    trimmed.trim()
}

fn leading_tag(content: &str) -> Option<&str> {
    let trimmed = content.trim_start();
    let rest = trimmed.strip_prefix('[')?;
    rest.find(']').map(|end| &rest[..end])
}

pub fn is_placeholder(content: &str, min_chars: usize) -> bool {
    strip_tag(content).chars().count() < min_chars
}

pub fn score_hook(hook: &str, config: &ReviewConfig) -> u8 {
    let words = hook.split_whitespace().count();
    let length = match words {
        6..=20 => 3,
        3..=5 | 21..=30 => 1,
        _ => 0,
    };
    let lower = hook.to_lowercase();
    let engagement = config
        .engagement_patterns
        .iter()
        .filter(|p| lower.contains(&p.to_lowercase()))
        .count()
        .min(3) as u32;
    let normalized = normalize_title(hook);
    let power = config
        .power_words
        .iter()
        .filter(|w| contains_term(&normalized, w))
        .count()
        .min(3) as u32;
    clamp(1 + length + engagement + power)
}

pub fn score_depth(script: &Script, config: &ReviewConfig) -> u8 {
    let count = script.sections.len();
    let structure = match count {
        0..=2 => 1,
        3 => 2,
        4 => 3,
        _ => 4,
    };
    let duration = match script.estimated_duration {
        d if d >= 60 => 3,
        d if d >= 45 => 2,
        d if d >= 30 => 1,
        _ => 0,
    };
    let substantive = script
        .sections
        .iter()
        .filter(|s| !is_placeholder(&s.content, config.placeholder_min_chars))
        .count();
    let ratio = if count == 0 {
        0
    } else {
        ((substantive as f64 / count as f64) * 3.0).round() as u32
    };
    clamp(structure + duration + ratio)
}

fn section_is(section_name: &str, content: &str, purpose: &str) -> bool {
    section_name.eq_ignore_ascii_case(purpose)
        || leading_tag(content).is_some_and(|tag| tag.eq_ignore_ascii_case(purpose))
}

pub fn score_flow(script: &Script) -> u8 {
    let mut score = 4;
    if let Some(first) = script.sections.first() {
        if section_is(&first.section_name, &first.content, "hook") {
            score += 3;
        }
    }
    if let Some(last) = script.sections.last() {
        if section_is(&last.section_name, &last.content, "cta") {
            score += 3;
        }
    }
    clamp(score)
}

pub fn score_differentiation(angles: &[String]) -> u8 {
    if angles.is_empty() {
        return 1;
    }
    let count = angles.len().min(3) as u32;
    let specific = angles
        .iter()
        .filter(|a| a.split_whitespace().count() >= 8)
        .count()
        .min(2) as u32;
    clamp(2 + 2 * count + specific)
}

pub fn review_script(script: &Script, config: &ReviewConfig) -> ReviewResult {
    let scores = ReviewScores::from_parts(
        score_hook(&script.hook, config),
        score_depth(script, config),
        score_flow(script),
        score_differentiation(&script.differentiation),
    );
    let review_status = ReviewStatus::from_overall(
        scores.overall,
        config.approve_threshold,
        config.reject_threshold,
    );
    let revision_needed: Vec<String> = script
        .sections
        .iter()
        .filter(|s| is_placeholder(&s.content, config.placeholder_min_chars))
        .map(|s| s.section_name.clone())
        .collect();
    ReviewResult {
        script_id: script.id.clone(),
        production_ready: review_status == ReviewStatus::Approved && revision_needed.is_empty(),
        scores,
        review_status,
        revision_needed,
    }
}

pub fn review(upstream: Upstream<ScriptBatch>, config: &ReviewConfig) -> Artifact<ReviewedScripts> {
    let empty = ReviewedScripts {
        approve_threshold: config.approve_threshold,
        reject_threshold: config.reject_threshold,
        reviewed: Vec::new(),
    };
    let batch = match upstream {
        Upstream::Ready(batch) => batch,
        Upstream::Missing(reason) => {
            warn!("Review upstream missing: {}", reason);
            return Artifact::degraded(empty, reason);
        }
    };
    if batch.payload.scripts.is_empty() {
        return Artifact::degraded(empty, "no scripts to review").with_source_ref(batch.id);
    }

    let reviewed: Vec<ReviewedScript> = batch
        .payload
        .scripts
        .iter()
        .map(|script| ReviewedScript {
            review: review_script(script, config),
            script: script.clone(),
        })
        .collect();

    let approved = reviewed
        .iter()
        .filter(|r| r.review.review_status == ReviewStatus::Approved)
        .count();
    info!("Reviewed {} scripts, {} approved", reviewed.len(), approved);

    let status = match batch.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    Artifact::new(
        ReviewedScripts {
            reviewed,
            ..empty
        },
        status,
    )
    .with_source_ref(batch.id)
}

pub async fn run(ctx: &StageContext, config: &ReviewConfig) -> Result<StageReport, StageError> {
    let upstream = ctx.store.upstream::<ScriptBatch>().await;
    let artifact = review(upstream, config);
    ctx.finish(&artifact).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use artifacts::models::script::{FormatTier, ScriptSection};

    use super::*;

    fn section(name: &str, content: &str, seconds: u32) -> ScriptSection {
        ScriptSection {
            section_name: name.to_string(),
            content: content.to_string(),
            duration_seconds: seconds,
        }
    }

    fn script(sections: Vec<ScriptSection>, differentiation: Vec<&str>) -> Script {
        let total = sections.iter().map(|s| s.duration_seconds).sum();
        Script {
            id: "SCP_20260101T000000000000Z_deadbeef".to_string(),
            trend_title: "Rust 2026 roadmap".to_string(),
            template_id: "news_flash".to_string(),
            format: FormatTier::Short,
            category: "dev".to_string(),
            source: "Rust Blog".to_string(),
            hook: "Why is everyone suddenly talking about the new Rust roadmap?".to_string(),
            sections,
            variables: BTreeMap::new(),
            differentiation: differentiation.into_iter().map(str::to_string).collect(),
            estimated_duration: total,
        }
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder("[DETAILS]", 20));
        assert!(is_placeholder("[DETAILS] too short", 20));
        assert!(!is_placeholder(
            "[DETAILS] The project published its goals for the year.",
            20
        ));
        assert_eq!(strip_tag("  [CTA]  Follow us  "), "Follow us");
    }

    #[test]
    fn flow_rewards_hook_first_and_cta_last() {
        let good = script(
            vec![
                section("hook", "[HOOK] Why this matters right now for you", 10),
                section("details", "[DETAILS] Something substantive happened here.", 40),
                section("cta", "[CTA] Follow for more breakdowns like this.", 10),
            ],
            vec![],
        );
        assert_eq!(score_flow(&good), 10);

        let reversed = script(
            vec![
                section("cta", "[CTA] Follow for more breakdowns like this.", 10),
                section("hook", "[HOOK] Why this matters right now for you", 10),
            ],
            vec![],
        );
        assert_eq!(score_flow(&reversed), 4);
    }

    #[test]
    fn sub_scores_stay_in_range() {
        let config = ReviewConfig::default();
        let bare = script(vec![section("x", "[X]", 5)], vec![]);
        let result = review_script(&bare, &config);
        for s in [
            result.scores.hook,
            result.scores.depth,
            result.scores.flow,
            result.scores.differentiation,
        ] {
            assert!((1..=10).contains(&s));
        }
        assert_eq!(result.revision_needed, vec!["x".to_string()]);
        assert!(!result.production_ready);
    }

    #[test]
    fn hook_heuristics() {
        let config = ReviewConfig::default();
        let strong = score_hook("Why is everyone suddenly talking about the new Rust roadmap?", &config);
        let weak = score_hook("Rust", &config);
        assert!(strong > weak);
        assert_eq!(weak, 1);
    }

    #[test]
    fn scenario_b_scores_approve() {
        // sections [hook(10s), details(40s), cta(10s)] scored [8, 7, 9, 6]
        let s = script(
            vec![
                section("hook", "[HOOK] Why this matters right now for you", 10),
                section("details", "[DETAILS] The roadmap lists three flagship goals.", 40),
                section("cta", "[CTA] Follow for more breakdowns like this.", 10),
            ],
            vec!["Show working code on screen within the first half"],
        );
        s.check_structure().unwrap();
        assert_eq!(s.estimated_duration, 60);

        let scores = ReviewScores::from_parts(8, 7, 9, 6);
        assert_eq!(scores.overall, 7);
        assert_eq!(
            ReviewStatus::from_overall(scores.overall, 7, 4),
            ReviewStatus::Approved
        );

        // hook 8, depth 8 (3 sections, 60s, all substantive), flow 10, one specific angle 5
        let result = review_script(&s, &ReviewConfig::default());
        assert_eq!(
            (result.scores.hook, result.scores.depth, result.scores.flow, result.scores.differentiation),
            (8, 8, 10, 5)
        );
        assert_eq!(result.scores.overall, 7);
        assert_eq!(result.review_status, ReviewStatus::Approved);
        assert!(result.production_ready);
    }

    #[test]
    fn reviewed_verdicts_land_on_the_thresholds() {
        let config = ReviewConfig::default();
        // Single substantive 20s section: depth 4, flow 4, no angles
        let mut rejected = script(
            vec![section("details", "[DETAILS] The roadmap lists three flagship goals.", 20)],
            vec![],
        );
        rejected.id = "SCP_20260101T000000000000Z_00000004".to_string();
        // Hook first but no CTA, 30s: depth 5, flow 7, no angles
        let mut revise = script(
            vec![
                section("hook", "[HOOK] Why this matters right now for you", 10),
                section("details", "[DETAILS] The roadmap lists three flagship goals.", 20),
            ],
            vec![],
        );
        revise.id = "SCP_20260101T000000000000Z_00000005".to_string();
        let mut approved = script(
            vec![
                section("hook", "[HOOK] Why this matters right now for you", 10),
                section("details", "[DETAILS] The roadmap lists three flagship goals.", 40),
                section("cta", "[CTA] Follow for more breakdowns like this.", 10),
            ],
            vec!["Show working code on screen within the first half"],
        );
        approved.id = "SCP_20260101T000000000000Z_00000007".to_string();

        let upstream = Artifact::new(
            ScriptBatch {
                scripts: vec![rejected, revise, approved],
            },
            ArtifactStatus::Healthy,
        );
        let artifact = review(Upstream::Ready(upstream), &config);
        artifact.validate().unwrap();

        let verdicts: Vec<(u8, ReviewStatus)> = artifact
            .payload
            .reviewed
            .iter()
            .map(|r| (r.review.scores.overall, r.review.review_status))
            .collect();
        assert_eq!(
            verdicts,
            vec![
                (4, ReviewStatus::Rejected),
                (5, ReviewStatus::NeedsRevision),
                (7, ReviewStatus::Approved),
            ]
        );
    }

    #[test]
    fn verdict_boundaries_from_config() {
        let config = ReviewConfig::default();
        assert_eq!(
            ReviewStatus::from_overall(4, config.approve_threshold, config.reject_threshold),
            ReviewStatus::Rejected
        );
        assert_eq!(
            ReviewStatus::from_overall(5, config.approve_threshold, config.reject_threshold),
            ReviewStatus::NeedsRevision
        );
    }

    #[test]
    fn reviewed_artifact_validates() {
        let config = ReviewConfig::default();
        let batch = ScriptBatch {
            scripts: vec![script(
                vec![
                    section("hook", "[HOOK] Why this matters right now for you", 10),
                    section("details", "[DETAILS]", 40),
                    section("cta", "[CTA] Follow for more breakdowns like this.", 10),
                ],
                vec!["Pair every claim with a diagram or live visual"],
            )],
        };
        let upstream = Artifact::new(batch, ArtifactStatus::Healthy);
        let artifact = review(Upstream::Ready(upstream), &config);
        artifact.validate().unwrap();
        assert_eq!(
            artifact.payload.reviewed[0].review.revision_needed,
            vec!["details".to_string()]
        );
    }
}
