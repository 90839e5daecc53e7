//! Asset QA Gate
//!
//! Deterministic checks over every asset brief. Any failure blocks the
//! brief; warnings beyond the configured allowance send it to review.

use std::collections::HashSet;

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::{
        asset::{AssetBrief, AssetBriefBatch, AssetType, ComplianceStatus, format_timecode},
        qa::{AssetQaBatch, AssetQaReport, GateStatus, QaCheck},
    },
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::services::{
    config::AssetsConfig,
    context::{StageContext, StageError, StageReport},
    trends::scoring::{contains_term, normalize_title},
};

static TIMECODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}\.\d{3}$").expect("valid timecode regex"));

fn check_coverage(brief: &AssetBrief) -> QaCheck {
    let mapped: HashSet<AssetType> = brief
        .scene_map
        .iter()
        .flat_map(|s| s.asset_types.iter().copied())
        .collect();
    let missing: Vec<&str> = brief
        .required_assets
        .iter()
        .map(|a| a.asset_type)
        .filter(|t| *t != AssetType::Thumbnail && !mapped.contains(t))
        .map(|t| t.as_str())
        .collect();
    let has_thumbnail = brief
        .required_assets
        .iter()
        .any(|a| a.asset_type == AssetType::Thumbnail && a.quantity > 0);

    if brief.required_assets.is_empty() {
        QaCheck::fail("required_coverage", "coverage", "no required assets listed")
    } else if !has_thumbnail {
        QaCheck::fail("required_coverage", "coverage", "thumbnail missing from required assets")
    } else if !missing.is_empty() {
        QaCheck::fail(
            "required_coverage",
            "coverage",
            format!("required assets never placed in a scene: {}", missing.join(", ")),
        )
    } else {
        QaCheck::pass("required_coverage", "coverage", "all required assets are placed")
    }
}

fn check_mapping(brief: &AssetBrief) -> QaCheck {
    if let Err(msg) = brief.check_partition() {
        return QaCheck::fail("scene_mapping", "mapping", msg);
    }
    let mut frames = HashSet::new();
    for scene in &brief.scene_map {
        if scene.storyboard_frame.trim().is_empty() {
            return QaCheck::fail(
                "scene_mapping",
                "mapping",
                format!("{} has no storyboard frame", scene.scene_id),
            );
        }
        if !frames.insert(scene.storyboard_frame.as_str()) {
            return QaCheck::fail(
                "scene_mapping",
                "mapping",
                format!("frame {} mapped to more than one scene", scene.storyboard_frame),
            );
        }
    }
    QaCheck::pass(
        "scene_mapping",
        "mapping",
        format!("{} scenes map one-to-one onto frames", brief.scene_map.len()),
    )
}

fn check_prompts(brief: &AssetBrief, config: &AssetsConfig) -> Vec<QaCheck> {
    brief
        .scene_map
        .iter()
        .map(|scene| {
            let id = format!("prompt_length_{}", scene.scene_id);
            let len = scene.visual_prompt.chars().count();
            if len < config.prompt_min_chars {
                QaCheck::fail(
                    &id,
                    "prompt",
                    format!("prompt is {} chars, minimum {}", len, config.prompt_min_chars),
                )
            } else if len > config.prompt_max_chars {
                QaCheck::warn(
                    &id,
                    "prompt",
                    format!("prompt is {} chars, maximum {}", len, config.prompt_max_chars),
                )
            } else {
                QaCheck::pass(&id, "prompt", format!("{} chars", len))
            }
        })
        .collect()
}

fn check_disallowed(brief: &AssetBrief, config: &AssetsConfig) -> QaCheck {
    let text = normalize_title(&format!(
        "{} {}",
        brief.title,
        brief
            .scene_map
            .iter()
            .map(|s| s.visual_prompt.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    ));
    let found: Vec<&str> = config
        .disallowed_words
        .iter()
        .filter(|w| contains_term(&text, w))
        .map(String::as_str)
        .collect();
    if found.is_empty() {
        QaCheck::pass("disallowed_content", "content", "no disallowed words")
    } else {
        QaCheck::fail(
            "disallowed_content",
            "content",
            format!("disallowed words present: {}", found.join(", ")),
        )
    }
}

fn check_timecodes(brief: &AssetBrief) -> QaCheck {
    for scene in &brief.scene_map {
        for (code, seconds) in [
            (&scene.timecode_start, scene.t_start),
            (&scene.timecode_end, scene.t_end),
        ] {
            if !TIMECODE_RE.is_match(code) {
                return QaCheck::fail(
                    "timecodes",
                    "timecode",
                    format!("{} has malformed timecode '{}'", scene.scene_id, code),
                );
            }
            if *code != format_timecode(seconds) {
                return QaCheck::fail(
                    "timecodes",
                    "timecode",
                    format!("{} timecode '{}' does not match {}s", scene.scene_id, code, seconds),
                );
            }
        }
    }
    QaCheck::pass("timecodes", "timecode", "all timecodes well formed")
}

fn check_compliance(brief: &AssetBrief) -> QaCheck {
    match brief.compliance.status {
        ComplianceStatus::Clear => QaCheck::pass("compliance", "compliance", "clear"),
        ComplianceStatus::Review => QaCheck::warn(
            "compliance",
            "compliance",
            brief.compliance.notes.clone(),
        ),
    }
}

pub fn inspect(brief: &AssetBrief, config: &AssetsConfig) -> AssetQaReport {
    let mut checks = vec![check_coverage(brief), check_mapping(brief)];
    checks.extend(check_prompts(brief, config));
    checks.push(check_disallowed(brief, config));
    checks.push(check_timecodes(brief));
    checks.push(check_compliance(brief));
    AssetQaReport::from_checks(&brief.brief_id, &brief.script_id, checks, config.max_warnings)
}

pub fn gate(upstream: Upstream<AssetBriefBatch>, config: &AssetsConfig) -> Artifact<AssetQaBatch> {
    let empty = AssetQaBatch {
        max_warnings: config.max_warnings,
        reports: Vec::new(),
    };
    let batch = match upstream {
        Upstream::Ready(batch) => batch,
        Upstream::Missing(reason) => {
            warn!("Asset QA upstream missing: {}", reason);
            return Artifact::degraded(empty, reason);
        }
    };
    if batch.payload.briefs.is_empty() {
        return Artifact::degraded(empty, "no asset briefs to inspect").with_source_ref(batch.id);
    }

    let reports: Vec<AssetQaReport> = batch
        .payload
        .briefs
        .iter()
        .map(|brief| inspect(brief, config))
        .collect();
    for report in reports.iter().filter(|r| r.gate_status != GateStatus::Approved) {
        warn!("Asset brief {} gated: {:?}", report.brief_id, report.gate_status);
    }
    info!("Inspected {} asset briefs", reports.len());

    let status = match batch.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    Artifact::new(
        AssetQaBatch {
            reports,
            ..empty
        },
        status,
    )
    .with_source_ref(batch.id)
}

pub async fn run(ctx: &StageContext, config: &AssetsConfig) -> Result<StageReport, StageError> {
    let upstream = ctx.store.upstream::<AssetBriefBatch>().await;
    let artifact = gate(upstream, config);
    ctx.finish(&artifact).await
}

#[cfg(test)]
mod tests {
    use artifacts::models::{
        asset::{Compliance, RequiredAsset, Scene},
        qa::{CheckResult, GateResult},
        script::FormatTier,
    };

    use super::*;

    fn scene(id: &str, start: u32, end: u32, prompt: &str, types: Vec<AssetType>) -> Scene {
        Scene {
            scene_id: id.to_string(),
            section_name: id.to_string(),
            t_start: start,
            t_end: end,
            timecode_start: format_timecode(start),
            timecode_end: format_timecode(end),
            visual_prompt: prompt.to_string(),
            storyboard_frame: format!("frame_{}", id),
            asset_types: types,
        }
    }

    fn clean_brief() -> AssetBrief {
        AssetBrief {
            brief_id: "BRF_1".to_string(),
            script_id: "SCP_1".to_string(),
            title: "Rust roadmap".to_string(),
            format: FormatTier::Short,
            duration_seconds: 60,
            visual_style: "bold".to_string(),
            required_assets: vec![
                RequiredAsset { asset_type: AssetType::Thumbnail, quantity: 1 },
                RequiredAsset { asset_type: AssetType::TitleCard, quantity: 1 },
                RequiredAsset { asset_type: AssetType::BRoll, quantity: 2 },
            ],
            scene_map: vec![
                scene("a", 0, 10, "Bold typography reveals the roadmap", vec![AssetType::TitleCard]),
                scene("b", 10, 60, "Developers at desks reviewing compiler output", vec![AssetType::BRoll]),
            ],
            compliance: Compliance {
                status: ComplianceStatus::Clear,
                trademark_terms: vec![],
                notes: String::new(),
            },
        }
    }

    fn result_of<'a>(report: &'a AssetQaReport, id: &str) -> Option<&'a QaCheck> {
        report.checks.iter().find(|c| c.check_id == id)
    }

    #[test]
    fn clean_brief_is_approved() {
        let report = inspect(&clean_brief(), &AssetsConfig::default());
        assert_eq!(report.gate_result, GateResult::Approved);
        assert_eq!(report.gate_status, GateStatus::Approved);
    }

    #[test]
    fn unplaced_asset_fails_coverage() {
        let mut brief = clean_brief();
        brief.scene_map[1].asset_types.clear();
        let report = inspect(&brief, &AssetsConfig::default());
        assert_eq!(result_of(&report, "required_coverage").unwrap().result, CheckResult::Fail);
        assert_eq!(report.gate_status, GateStatus::Blocked);
    }

    #[test]
    fn short_prompt_fails_long_prompt_warns() {
        let mut brief = clean_brief();
        brief.scene_map[0].visual_prompt = "tiny".to_string();
        brief.scene_map[1].visual_prompt = "x".repeat(500);
        let report = inspect(&brief, &AssetsConfig::default());
        assert_eq!(result_of(&report, "prompt_length_a").unwrap().result, CheckResult::Fail);
        assert_eq!(result_of(&report, "prompt_length_b").unwrap().result, CheckResult::Warn);
    }

    #[test]
    fn disallowed_words_block() {
        let mut brief = clean_brief();
        brief.scene_map[1].visual_prompt = "Close-up of blood on the keyboard".to_string();
        let report = inspect(&brief, &AssetsConfig::default());
        assert_eq!(result_of(&report, "disallowed_content").unwrap().result, CheckResult::Fail);
    }

    #[test]
    fn malformed_timecode_fails() {
        let mut brief = clean_brief();
        brief.scene_map[0].timecode_end = "0:00:10".to_string();
        let report = inspect(&brief, &AssetsConfig::default());
        assert_eq!(result_of(&report, "timecodes").unwrap().result, CheckResult::Fail);
    }

    #[test]
    fn warnings_beyond_allowance_require_review() {
        let mut brief = clean_brief();
        brief.compliance.status = ComplianceStatus::Review;
        brief.scene_map[0].visual_prompt = "y".repeat(450);
        brief.scene_map[1].visual_prompt = "z".repeat(450);
        let config = AssetsConfig::default();
        let report = inspect(&brief, &config);
        assert_eq!(report.gate_result, GateResult::Approved);
        assert_eq!(report.gate_status, GateStatus::ReviewRequired);
    }

    #[test]
    fn gated_batch_validates() {
        let upstream = Artifact::new(
            AssetBriefBatch {
                briefs: vec![clean_brief()],
            },
            ArtifactStatus::Healthy,
        );
        let artifact = gate(Upstream::Ready(upstream), &AssetsConfig::default());
        artifact.validate().unwrap();
        assert_eq!(artifact.payload.approved().count(), 1);
    }
}
