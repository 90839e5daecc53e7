//! Renderer Runner
//!
//! Turns every asset brief approved by the asset QA gate into a master file
//! and records a verifiable proof (sha256, byte count, stream probe) for it.
//! Runs under the production lock; a busy lock is a clean no-op.

use std::path::Path;

use artifacts::{
    Artifact, ArtifactKind, ArtifactStatus, Upstream,
    models::{
        asset::{AssetBrief, AssetBriefBatch},
        master::{FileProof, MasterManifest, RenderFailure, RenderRun},
        qa::AssetQaBatch,
    },
};
use chrono::Utc;
use tracing::{info, warn};
use utils::{
    assets::{masters_dir, production_lock_path},
    hash::sha256_file,
    ids::artifact_id,
};

use super::ffmpeg::{EncodeRequest, Encoder, Prober, ToolError};
use crate::services::{
    config::ProductionConfig,
    context::{StageContext, StageError, StageReport},
};

pub const MASTER_ID_PREFIX: &str = "MST";

/// Briefs cleared for rendering: approved by the asset gate and present in
/// the brief batch.
pub fn render_requests<'a>(
    qa: &AssetQaBatch,
    briefs: &'a AssetBriefBatch,
) -> (Vec<&'a AssetBrief>, Vec<RenderFailure>) {
    let mut requests = Vec::new();
    let mut missing = Vec::new();
    for report in qa.approved() {
        match briefs.find(&report.brief_id) {
            Some(brief) => requests.push(brief),
            None => missing.push(RenderFailure {
                brief_id: report.brief_id.clone(),
                script_id: report.script_id.clone(),
                error: "brief not present in the latest asset briefs".to_string(),
            }),
        }
    }
    (requests, missing)
}

async fn render_one(
    brief: &AssetBrief,
    config: &ProductionConfig,
    masters: &Path,
    encoder: &dyn Encoder,
    prober: &dyn Prober,
) -> Result<MasterManifest, ToolError> {
    let master_id = artifact_id(MASTER_ID_PREFIX, Utc::now());
    let output = masters.join(format!("{}.mp4", master_id));
    let request = EncodeRequest {
        output: output.clone(),
        width: config.width,
        height: config.height,
        fps: config.fps,
        duration_seconds: brief.duration_seconds.clamp(1, config.max_duration_seconds.max(1)),
    };

    encoder.encode(&request).await?;
    let (sha256, bytes) = sha256_file(&output)
        .await
        .map_err(|source| ToolError::Io {
            path: output.clone(),
            source,
        })?;
    let probe_summary = prober.probe(&output).await?;

    Ok(MasterManifest {
        master_id,
        brief_id: brief.brief_id.clone(),
        script_id: brief.script_id.clone(),
        title: brief.title.clone(),
        rendered_at: Utc::now(),
        file_proof: FileProof {
            path: output.to_string_lossy().to_string(),
            bytes,
            sha256,
            probe_summary,
        },
    })
}

pub async fn render(
    qa: Upstream<AssetQaBatch>,
    briefs: Upstream<AssetBriefBatch>,
    config: &ProductionConfig,
    masters: &Path,
    encoder: &dyn Encoder,
    prober: &dyn Prober,
) -> Artifact<RenderRun> {
    let empty = RenderRun::empty(config.target());
    let qa = match qa {
        Upstream::Ready(qa) => qa,
        Upstream::Missing(reason) => {
            warn!("Render upstream missing: {}", reason);
            return Artifact::degraded(empty, reason);
        }
    };
    let briefs = match briefs {
        Upstream::Ready(briefs) => briefs,
        Upstream::Missing(reason) => {
            warn!("Asset briefs unavailable for rendering: {}", reason);
            return Artifact::degraded(empty, reason).with_source_ref(qa.id);
        }
    };

    let (requests, mut failures) = render_requests(&qa.payload, &briefs.payload);
    if requests.is_empty() && failures.is_empty() {
        return Artifact::degraded(empty, "no approved asset briefs to render")
            .with_source_ref(qa.id);
    }

    let mut masters_out = Vec::new();
    for brief in requests {
        match render_one(brief, config, masters, encoder, prober).await {
            Ok(manifest) => {
                info!(
                    "Rendered {} for brief {} ({} bytes)",
                    manifest.master_id, brief.brief_id, manifest.file_proof.bytes
                );
                masters_out.push(manifest);
            }
            Err(e) => {
                warn!("Render failed for brief {}: {}", brief.brief_id, e);
                failures.push(RenderFailure {
                    brief_id: brief.brief_id.clone(),
                    script_id: brief.script_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let reason = (!failures.is_empty())
        .then(|| format!("{} of {} renders failed", failures.len(), failures.len() + masters_out.len()));
    let status = if masters_out.is_empty() {
        ArtifactStatus::Failed
    } else if failures.is_empty() && qa.status == ArtifactStatus::Healthy {
        ArtifactStatus::Healthy
    } else {
        ArtifactStatus::Partial
    };

    let mut artifact = Artifact::new(
        RenderRun {
            masters: masters_out,
            failures,
            ..empty
        },
        status,
    )
    .with_source_ref(qa.id);
    if let Some(reason) = reason {
        artifact = artifact.with_reason(reason);
    }
    artifact
}

pub async fn run(
    ctx: &StageContext,
    config: &ProductionConfig,
    encoder: &dyn Encoder,
    prober: &dyn Prober,
) -> Result<StageReport, StageError> {
    let Some(_lock) = ctx.try_lock(&production_lock_path(ctx.root()))? else {
        warn!("Production lock busy, skipping render");
        return Ok(StageReport::lock_busy(ArtifactKind::RenderRun.service()));
    };

    let qa = ctx.store.upstream::<AssetQaBatch>().await;
    let briefs = ctx.store.upstream::<AssetBriefBatch>().await;
    let artifact = render(qa, briefs, config, &masters_dir(ctx.root()), encoder, prober).await;
    ctx.finish(&artifact).await
}
