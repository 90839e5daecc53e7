//! Production QA Gate
//!
//! Re-validates every rendered master against the technical acceptance
//! criteria. The probe is re-derived from the file rather than trusted from
//! the manifest. Structural failures (missing file, empty file, unprobeable)
//! end the check list early.

use std::path::Path;

use artifacts::{
    Artifact, ArtifactKind, ArtifactStatus, Upstream,
    models::{
        master::{MasterManifest, ProbeSummary, RenderRun},
        qa::{CheckResult, GateResult, ProductionQaBatch, ProductionQaReport, QaCheck},
    },
};
use tracing::{info, warn};
use utils::{assets::production_lock_path, hash::sha256_file};

use super::ffmpeg::Prober;
use crate::services::{
    config::ProductionConfig,
    context::{StageContext, StageError, StageReport},
};

const FRAME_RATE_EPSILON: f64 = 0.01;

pub async fn inspect(
    manifest: &MasterManifest,
    config: &ProductionConfig,
    prober: &dyn Prober,
) -> ProductionQaReport {
    let path = Path::new(&manifest.file_proof.path);
    let report = |checks: Vec<QaCheck>, probe: Option<ProbeSummary>| {
        ProductionQaReport::from_checks(&manifest.master_id, &manifest.file_proof.path, checks, probe)
    };
    let mut checks = Vec::new();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => {
            checks.push(QaCheck::pass("file_exists", "file", "master file present"));
            metadata
        }
        _ => {
            checks.push(QaCheck::fail(
                "file_exists",
                "file",
                format!("{} does not exist", path.display()),
            ));
            return report(checks, None);
        }
    };

    if metadata.len() == 0 {
        checks.push(QaCheck::fail("file_nonempty", "file", "master file is empty"));
        return report(checks, None);
    }
    checks.push(QaCheck::pass(
        "file_nonempty",
        "file",
        format!("{} bytes", metadata.len()),
    ));

    let probe = match prober.probe(path).await {
        Ok(probe) => {
            checks.push(QaCheck::pass("probe", "probe", "stream probe succeeded"));
            probe
        }
        Err(e) => {
            checks.push(QaCheck::fail("probe", "probe", e.to_string()));
            return report(checks, None);
        }
    };

    let expected = format!("{}x{}", config.width, config.height);
    checks.push(if probe.width == config.width && probe.height == config.height {
        QaCheck::pass("resolution", "video", expected)
    } else {
        QaCheck::fail(
            "resolution",
            "video",
            format!("resolution {} does not match required {}", probe.resolution(), expected),
        )
    });

    let ceiling = config.max_duration_seconds as f64 + config.duration_tolerance_seconds;
    checks.push(if probe.duration_seconds <= 0.0 {
        QaCheck::fail("duration", "video", "master has no measurable duration")
    } else if probe.duration_seconds > ceiling {
        QaCheck::fail(
            "duration",
            "video",
            format!(
                "duration {:.2}s exceeds ceiling {}s",
                probe.duration_seconds, config.max_duration_seconds
            ),
        )
    } else {
        QaCheck::pass("duration", "video", format!("{:.2}s", probe.duration_seconds))
    });

    checks.push(match &probe.audio_codec {
        Some(codec) => QaCheck::pass("audio_stream", "audio", format!("audio stream ({})", codec)),
        None => QaCheck::fail("audio_stream", "audio", "no audio stream"),
    });

    checks.push(
        if (probe.frame_rate - config.fps as f64).abs() <= FRAME_RATE_EPSILON {
            QaCheck::pass("frame_rate", "video", format!("{} fps", config.fps))
        } else {
            QaCheck::warn(
                "frame_rate",
                "video",
                format!("{:.3} fps, target {}", probe.frame_rate, config.fps),
            )
        },
    );

    checks.push(match sha256_file(path).await {
        Ok((sha, _)) if sha == manifest.file_proof.sha256 => {
            QaCheck::pass("hash", "integrity", "sha256 matches the manifest")
        }
        Ok((sha, _)) => QaCheck::fail(
            "hash",
            "integrity",
            format!("sha256 {} differs from manifest {}", sha, manifest.file_proof.sha256),
        ),
        Err(e) => QaCheck::fail("hash", "integrity", format!("could not hash master: {}", e)),
    });

    report(checks, Some(probe))
}

pub async fn gate(
    upstream: Upstream<RenderRun>,
    config: &ProductionConfig,
    prober: &dyn Prober,
) -> Artifact<ProductionQaBatch> {
    let run = match upstream {
        Upstream::Ready(run) => run,
        Upstream::Missing(reason) => {
            warn!("Production QA upstream missing: {}", reason);
            return Artifact::degraded(ProductionQaBatch::default(), reason);
        }
    };
    if run.payload.masters.is_empty() {
        return Artifact::degraded(ProductionQaBatch::default(), "no masters to inspect")
            .with_source_ref(run.id);
    }

    let mut reports = Vec::with_capacity(run.payload.masters.len());
    for manifest in &run.payload.masters {
        let report = inspect(manifest, config, prober).await;
        if report.gate_result == GateResult::Rejected {
            let failed: Vec<&str> = report
                .checks
                .iter()
                .filter(|c| c.result == CheckResult::Fail)
                .map(|c| c.check_id.as_str())
                .collect();
            warn!("Master {} rejected: {}", manifest.master_id, failed.join(", "));
        }
        reports.push(report);
    }
    info!("Inspected {} masters", reports.len());

    let status = match run.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    Artifact::new(ProductionQaBatch { reports }, status).with_source_ref(run.id)
}

pub async fn run(
    ctx: &StageContext,
    config: &ProductionConfig,
    prober: &dyn Prober,
) -> Result<StageReport, StageError> {
    let Some(_lock) = ctx.try_lock(&production_lock_path(ctx.root()))? else {
        warn!("Production lock busy, skipping production QA");
        return Ok(StageReport::lock_busy(ArtifactKind::ProductionQa.service()));
    };

    let upstream = ctx.store.upstream::<RenderRun>().await;
    let artifact = gate(upstream, config, prober).await;
    ctx.finish(&artifact).await
}

#[cfg(test)]
mod tests {
    use artifacts::models::master::FileProof;
    use chrono::Utc;
    use utils::hash::sha256_hex;

    use super::{
        super::renderer::fakes::{FakeProber, probe},
        *,
    };

    async fn master_on_disk(dir: &Path, body: &[u8]) -> MasterManifest {
        let path = dir.join("MST_test.mp4");
        tokio::fs::write(&path, body).await.unwrap();
        MasterManifest {
            master_id: "MST_20260101T000000000000Z_00000000".to_string(),
            brief_id: "BRF_1".to_string(),
            script_id: "SCP_1".to_string(),
            title: "t".to_string(),
            rendered_at: Utc::now(),
            file_proof: FileProof {
                path: path.to_string_lossy().to_string(),
                bytes: body.len() as u64,
                sha256: sha256_hex(body),
                probe_summary: probe(1080, 1920, 45.0),
            },
        }
    }

    fn fails(report: &ProductionQaReport) -> Vec<&str> {
        report
            .checks
            .iter()
            .filter(|c| c.result == CheckResult::Fail)
            .map(|c| c.check_id.as_str())
            .collect()
    }

    #[tokio::test]
    async fn good_master_is_approved() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = master_on_disk(dir.path(), b"video bytes").await;
        let report = inspect(
            &manifest,
            &ProductionConfig::default(),
            &FakeProber(probe(1080, 1920, 45.0)),
        )
        .await;
        assert_eq!(report.gate_result, GateResult::Approved);
        assert_eq!(report.checks.len(), 8);
    }

    #[tokio::test]
    async fn short_height_yields_exactly_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = master_on_disk(dir.path(), b"video bytes").await;
        let report = inspect(
            &manifest,
            &ProductionConfig::default(),
            &FakeProber(probe(1080, 1900, 45.0)),
        )
        .await;
        assert_eq!(fails(&report), vec!["resolution"]);
        assert_eq!(report.gate_result, GateResult::Rejected);
    }

    #[tokio::test]
    async fn missing_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = master_on_disk(dir.path(), b"x").await;
        manifest.file_proof.path = dir.path().join("gone.mp4").to_string_lossy().to_string();
        let report = inspect(
            &manifest,
            &ProductionConfig::default(),
            &FakeProber(probe(1080, 1920, 45.0)),
        )
        .await;
        assert_eq!(report.checks.len(), 1);
        assert_eq!(fails(&report), vec!["file_exists"]);
        assert!(report.probe.is_none());
    }

    #[tokio::test]
    async fn empty_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = master_on_disk(dir.path(), b"").await;
        let report = inspect(
            &manifest,
            &ProductionConfig::default(),
            &FakeProber(probe(1080, 1920, 45.0)),
        )
        .await;
        assert_eq!(fails(&report), vec!["file_nonempty"]);
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn tampered_file_fails_hash_and_overlong_fails_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = master_on_disk(dir.path(), b"video bytes").await;
        manifest.file_proof.sha256 = sha256_hex("something else");
        let report = inspect(
            &manifest,
            &ProductionConfig::default(),
            &FakeProber(probe(1080, 1920, 61.0)),
        )
        .await;
        assert_eq!(fails(&report), vec!["duration", "hash"]);
    }

    #[tokio::test]
    async fn frame_rate_mismatch_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = master_on_disk(dir.path(), b"video bytes").await;
        let mut p = probe(1080, 1920, 45.0);
        p.frame_rate = 29.97;
        let report = inspect(&manifest, &ProductionConfig::default(), &FakeProber(p)).await;
        assert_eq!(report.gate_result, GateResult::Approved);
        assert!(
            report
                .checks
                .iter()
                .any(|c| c.check_id == "frame_rate" && c.result == CheckResult::Warn)
        );
    }
}
