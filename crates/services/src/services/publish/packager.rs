//! Publish Packager
//!
//! Wraps every master approved by production QA into a publish package:
//! metadata, hashtags and timed captions. Idempotent on
//! `(publish_id, master_sha256)` through the packaged-pairs file; a run where
//! every pair is already packaged writes nothing.

use std::collections::HashSet;

use artifacts::{
    Artifact, ArtifactKind, ArtifactStatus, Upstream,
    bookkeeping::{PairKey, PackagedPairs},
    models::{
        master::{MasterManifest, RenderRun},
        publish::{PublishBatch, PublishPackage},
        qa::{ProductionQaBatch, ProductionQaReport},
        script::{ReviewedScripts, Script},
    },
};
use tracing::{debug, info, warn};
use utils::{
    assets::{publish_lock_path, state_dir},
    hash::sha256_hex,
};

use super::captions::build_captions;
use crate::services::{
    config::PublishConfig,
    context::{StageContext, StageError, StageReport},
    scripts::reviewer::strip_tag,
};

/// Keyed on the brief, which is stable across render cycles. A re-render
/// of the same brief reuses the publish id, so identical bytes pair up with
/// the earlier package.
pub fn publish_id(brief_id: &str) -> String {
    format!("PUBID_{}", &sha256_hex(brief_id)[..16])
}

pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let mut cut: String = title.chars().take(max_chars.saturating_sub(1)).collect();
    cut = cut.trim_end().to_string();
    cut.push('…');
    cut
}

pub fn hashtags(category: Option<&str>, config: &PublishConfig) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(category) = category {
        let word: String = category.chars().filter(|c| c.is_alphanumeric()).collect();
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            tags.push(format!("#{}{}", first.to_uppercase(), chars.as_str()));
        }
    }
    for tag in &config.base_hashtags {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.clone());
        }
    }
    tags
}

pub fn narration(script: &Script) -> String {
    script
        .sections
        .iter()
        .map(|s| strip_tag(&s.content))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn description(script: Option<&Script>, title: &str) -> String {
    match script {
        Some(script) => {
            let mut lines = vec![script.hook.clone()];
            if !script.differentiation.is_empty() {
                lines.push(String::new());
                lines.extend(script.differentiation.iter().cloned());
            }
            lines.join("\n")
        }
        None => title.to_string(),
    }
}

pub fn build_package(
    manifest: &MasterManifest,
    report: &ProductionQaReport,
    script: Option<&Script>,
    config: &PublishConfig,
) -> PublishPackage {
    // Prefer the probe the gate re-derived over the renderer's own
    let duration = report
        .probe
        .as_ref()
        .unwrap_or(&manifest.file_proof.probe_summary)
        .duration_seconds;
    let narration_text = script.map(narration);

    PublishPackage {
        publish_id: publish_id(&manifest.brief_id),
        master_id: manifest.master_id.clone(),
        master_sha256: manifest.file_proof.sha256.clone(),
        master_path: manifest.file_proof.path.clone(),
        duration_seconds: duration,
        title: truncate_title(&manifest.title, config.title_max_chars),
        description: description(script, &manifest.title),
        hashtags: hashtags(script.map(|s| s.category.as_str()), config),
        captions: build_captions(narration_text.as_deref(), duration, config),
    }
}

/// Outcome of a packaging pass before anything is persisted.
#[derive(Debug)]
pub enum Packaging {
    Batch(Artifact<PublishBatch>),
    /// Every approved master was already packaged.
    AlreadyPackaged(Vec<String>),
}

pub fn package(
    qa: Upstream<ProductionQaBatch>,
    renders: Upstream<RenderRun>,
    scripts: Upstream<ReviewedScripts>,
    packaged: &HashSet<PairKey>,
    config: &PublishConfig,
) -> Packaging {
    let qa = match qa {
        Upstream::Ready(qa) => qa,
        Upstream::Missing(reason) => {
            warn!("Packager upstream missing: {}", reason);
            return Packaging::Batch(Artifact::degraded(PublishBatch::default(), reason));
        }
    };
    let renders = match renders {
        Upstream::Ready(renders) => renders,
        Upstream::Missing(reason) => {
            warn!("Render manifests unavailable for packaging: {}", reason);
            return Packaging::Batch(
                Artifact::degraded(PublishBatch::default(), reason).with_source_ref(qa.id),
            );
        }
    };
    let mut notes = Vec::new();
    let scripts = match scripts {
        Upstream::Ready(scripts) => Some(scripts),
        Upstream::Missing(reason) => {
            warn!("Scripts unavailable, packaging with fallback captions: {}", reason);
            notes.push(reason);
            None
        }
    };

    let approved: Vec<&ProductionQaReport> = qa.payload.approved().collect();
    if approved.is_empty() {
        return Packaging::Batch(
            Artifact::degraded(PublishBatch::default(), "no approved masters to package")
                .with_source_ref(qa.id),
        );
    }

    let mut batch = PublishBatch::default();
    let mut unmatched = 0usize;
    for report in approved {
        let Some(manifest) = renders.payload.find(&report.master_id) else {
            warn!("No manifest for approved master {}", report.master_id);
            notes.push(format!("manifest for {} not found", report.master_id));
            unmatched += 1;
            continue;
        };
        let id = publish_id(&manifest.brief_id);
        if packaged.contains(&(id.clone(), manifest.file_proof.sha256.clone())) {
            debug!("{} already packaged for {}", id, manifest.master_id);
            batch.skipped.push(id);
            continue;
        }
        let script = scripts
            .as_ref()
            .and_then(|s| s.payload.find_script(&manifest.script_id));
        batch
            .packages
            .push(build_package(manifest, report, script, config));
    }

    if batch.packages.is_empty() && unmatched == 0 {
        return Packaging::AlreadyPackaged(batch.skipped);
    }

    let status = if batch.packages.is_empty() {
        ArtifactStatus::Degraded
    } else if notes.is_empty() && qa.status == ArtifactStatus::Healthy {
        ArtifactStatus::Healthy
    } else {
        ArtifactStatus::Partial
    };
    let mut artifact = Artifact::new(batch, status).with_source_ref(qa.id);
    if !notes.is_empty() {
        artifact = artifact.with_reason(notes.join("; "));
    }
    Packaging::Batch(artifact)
}

pub async fn run(ctx: &StageContext, config: &PublishConfig) -> Result<StageReport, StageError> {
    let stage = ArtifactKind::PublishBatch.service();
    let Some(_lock) = ctx.try_lock(&publish_lock_path(ctx.root()))? else {
        warn!("Publish lock busy, skipping packaging");
        return Ok(StageReport::lock_busy(stage));
    };

    let pairs = PackagedPairs::new(&state_dir(ctx.root()));
    let packaged = pairs.load().await.map_err(|source| StageError::Bookkeeping {
        path: state_dir(ctx.root()),
        source,
    })?;

    let qa = ctx.store.upstream::<ProductionQaBatch>().await;
    let renders = ctx.store.upstream::<RenderRun>().await;
    let scripts = ctx.store.upstream::<ReviewedScripts>().await;

    match package(qa, renders, scripts, &packaged, config) {
        Packaging::AlreadyPackaged(skipped) => {
            info!("All {} approved masters already packaged", skipped.len());
            Ok(StageReport::no_op(
                stage,
                ArtifactStatus::Healthy,
                format!("{} already packaged", skipped.len()),
            ))
        }
        Packaging::Batch(artifact) => {
            let report = ctx.finish(&artifact).await?;
            // Pairs are recorded only once the batch is durable
            for package in &artifact.payload.packages {
                pairs
                    .record(&package.publish_id, &package.master_sha256)
                    .await
                    .map_err(|source| StageError::Bookkeeping {
                        path: state_dir(ctx.root()),
                        source,
                    })?;
            }
            info!("Packaged {} masters", artifact.payload.packages.len());
            Ok(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use artifacts::models::{
        master::{FileProof, ProbeSummary},
        publish::CaptionSource,
        qa::QaCheck,
        script::{FormatTier, ScriptSection},
    };
    use chrono::Utc;

    use super::*;

    fn probe(duration: f64) -> ProbeSummary {
        ProbeSummary {
            width: 1080,
            height: 1920,
            duration_seconds: duration,
            video_codec: "h264".to_string(),
            audio_codec: Some("aac".to_string()),
            frame_rate: 30.0,
        }
    }

    fn manifest(id: &str) -> MasterManifest {
        MasterManifest {
            master_id: id.to_string(),
            brief_id: format!("BRF_{}", id),
            script_id: "SCP_1".to_string(),
            title: "Rust 2026 roadmap".to_string(),
            rendered_at: Utc::now(),
            file_proof: FileProof {
                path: format!("/masters/{}.mp4", id),
                bytes: 10,
                sha256: sha256_hex(id),
                probe_summary: probe(45.0),
            },
        }
    }

    fn script() -> Script {
        Script {
            id: "SCP_1".to_string(),
            trend_title: "Rust 2026 roadmap".to_string(),
            template_id: "news_flash".to_string(),
            format: FormatTier::Short,
            category: "dev".to_string(),
            source: "Rust Blog".to_string(),
            hook: "Why is everyone talking about the Rust roadmap?".to_string(),
            sections: vec![
                ScriptSection {
                    section_name: "hook".to_string(),
                    content: "[HOOK] Why is everyone talking about the Rust roadmap?".to_string(),
                    duration_seconds: 10,
                },
                ScriptSection {
                    section_name: "what_happened".to_string(),
                    content: "[NEWS] The project published its goals for the year.".to_string(),
                    duration_seconds: 35,
                },
            ],
            variables: BTreeMap::new(),
            differentiation: vec!["Show working code on screen".to_string()],
            estimated_duration: 45,
        }
    }

    fn upstreams(
        ids: &[&str],
    ) -> (
        Upstream<ProductionQaBatch>,
        Upstream<RenderRun>,
        Upstream<ReviewedScripts>,
    ) {
        let reports = ids
            .iter()
            .map(|id| {
                ProductionQaReport::from_checks(
                    *id,
                    format!("/masters/{}.mp4", id),
                    vec![QaCheck::pass("resolution", "video", "ok")],
                    Some(probe(44.5)),
                )
            })
            .collect();
        let mut run = RenderRun::empty(crate::services::config::ProductionConfig::default().target());
        run.masters = ids.iter().map(|id| manifest(id)).collect();
        let reviewed = ReviewedScripts {
            approve_threshold: 7,
            reject_threshold: 4,
            reviewed: vec![],
        };
        (
            Upstream::Ready(Artifact::new(ProductionQaBatch { reports }, ArtifactStatus::Healthy)),
            Upstream::Ready(Artifact::new(run, ArtifactStatus::Healthy)),
            Upstream::Ready(Artifact::new(reviewed, ArtifactStatus::Healthy)),
        )
    }

    #[test]
    fn publish_id_is_deterministic() {
        assert_eq!(publish_id("BRF_a"), publish_id("BRF_a"));
        assert!(publish_id("BRF_a").starts_with("PUBID_"));
        assert_ne!(publish_id("BRF_a"), publish_id("BRF_b"));
    }

    #[test]
    fn titles_are_capped() {
        let long = "x".repeat(150);
        let t = truncate_title(&long, 100);
        assert_eq!(t.chars().count(), 100);
        assert!(t.ends_with('…'));
        assert_eq!(truncate_title("  short  ", 100), "short");
    }

    #[test]
    fn hashtags_lead_with_category() {
        let config = PublishConfig::default();
        assert_eq!(hashtags(Some("dev"), &config), vec!["#Dev", "#Shorts", "#SKYBEAM"]);
        assert_eq!(hashtags(None, &config), vec!["#Shorts", "#SKYBEAM"]);
    }

    #[test]
    fn package_uses_narration_and_gate_probe() {
        let config = PublishConfig::default();
        let report = ProductionQaReport::from_checks("MST_1", "/m", vec![], Some(probe(44.5)));
        let s = script();
        let package = build_package(&manifest("MST_1"), &report, Some(&s), &config);

        assert_eq!(package.duration_seconds, 44.5);
        assert_eq!(package.captions.source, CaptionSource::Narration);
        assert_eq!(package.captions.segments.len(), 2);
        package.captions.check_timing(44.5).unwrap();
        assert!(package.description.starts_with(&s.hook));
        assert!(package.description.contains("Show working code on screen"));
    }

    #[test]
    fn already_packaged_pairs_are_skipped() {
        let config = PublishConfig::default();
        let (qa, renders, scripts) = upstreams(&["MST_1", "MST_2"]);
        let mut packaged = HashSet::new();
        packaged.insert((publish_id("BRF_MST_1"), sha256_hex("MST_1")));

        let Packaging::Batch(artifact) = package(qa, renders, scripts, &packaged, &config) else {
            panic!("expected a batch");
        };
        assert_eq!(artifact.payload.packages.len(), 1);
        assert_eq!(artifact.payload.skipped, vec![publish_id("BRF_MST_1")]);
        artifact.validate().unwrap();
        // Script missing from the review: fallback captions
        assert_eq!(
            artifact.payload.packages[0].captions.source,
            CaptionSource::Fallback
        );

        let (qa, renders, scripts) = upstreams(&["MST_1"]);
        assert!(matches!(
            package(qa, renders, scripts, &packaged, &config),
            Packaging::AlreadyPackaged(_)
        ));
    }

    #[tokio::test]
    async fn second_run_is_a_silent_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StageContext::new(artifacts::ArtifactStore::new(dir.path()));
        let (qa, renders, _) = upstreams(&["MST_1"]);
        ctx.store.write(&qa.ready().unwrap()).await.unwrap();
        ctx.store.write(&renders.ready().unwrap()).await.unwrap();
        let config = PublishConfig::default();

        let first = run(&ctx, &config).await.unwrap();
        assert!(first.wrote_artifact());
        assert_eq!(first.items, 1);

        let second = run(&ctx, &config).await.unwrap();
        assert!(!second.wrote_artifact());
        let history = ctx.store.history::<PublishBatch>(None).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
