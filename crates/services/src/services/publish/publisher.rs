//! Platform Publisher
//!
//! Attempts every packaged `(publish_id, master_sha256)` pair on one
//! platform and writes one receipt per attempt. The ledger decides what is
//! attempted: terminal pairs (`published`, `dry_run`) are skipped, failed
//! pairs are retried while `retry_count < max_retries`. Live or dry-run is
//! decided by credential presence alone.

use std::collections::HashSet;

use artifacts::{
    Artifact, ArtifactKind, ArtifactStatus,
    bookkeeping::{LedgerEntry, PairKey, PublishLedger, reconcile},
    models::publish::{
        PlatformReceipt, PublishBatch, PublishMode, PublishPackage, ReceiptStatus, RetryInfo,
        is_valid_scope,
    },
};
use chrono::Utc;
use tracing::{debug, info, warn};
use utils::assets::{publish_lock_path, state_dir};

use super::{
    connectors::{PlatformConnector, PublishError},
    credentials::{Credentials, load_credentials},
};
use crate::services::{
    config::PublishConfig,
    context::{StageContext, StageError, StageReport},
};

/// Every package ever written, oldest first, one per pair.
pub async fn packaged(ctx: &StageContext) -> Result<Vec<PublishPackage>, StageError> {
    let mut seen: HashSet<PairKey> = HashSet::new();
    let mut ordered = Vec::new();
    for batch in ctx.store.history::<PublishBatch>(None).await? {
        for package in batch.payload.packages {
            if seen.insert((package.publish_id.clone(), package.master_sha256.clone())) {
                ordered.push(package);
            }
        }
    }
    Ok(ordered)
}

/// What to do with one pair given its latest ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Attempt with this many prior failures.
    Attempt(u32),
    SkipTerminal,
    SkipExhausted,
}

pub fn plan(entry: Option<&LedgerEntry>) -> Plan {
    match entry {
        None => Plan::Attempt(0),
        Some(entry) if entry.status.is_terminal() => Plan::SkipTerminal,
        Some(entry) if entry.is_eligible() => Plan::Attempt(entry.retry_count),
        Some(_) => Plan::SkipExhausted,
    }
}

async fn attempt(
    package: &PublishPackage,
    credentials: &Credentials,
    connector: Option<&dyn PlatformConnector>,
) -> Result<Option<(String, Option<String>)>, PublishError> {
    let Some(oauth) = credentials.oauth() else {
        return Ok(None);
    };
    let connector = connector.ok_or_else(|| {
        PublishError::UnsupportedPlatform("no connector for this platform".to_string())
    })?;
    let uploaded = connector.upload(oauth, package).await?;
    Ok(Some((uploaded.platform_video_id, uploaded.platform_url)))
}

pub fn receipt_artifact(
    package: &PublishPackage,
    platform: &str,
    mode: PublishMode,
    outcome: &Result<Option<(String, Option<String>)>, PublishError>,
    prior_failures: u32,
    max_retries: u32,
) -> Artifact<PlatformReceipt> {
    let (status, retry_count, video, error) = match (mode, outcome) {
        (PublishMode::DryRun, _) => (ReceiptStatus::DryRun, prior_failures, None, None),
        (PublishMode::Live, Ok(video)) => (ReceiptStatus::Published, prior_failures, video.clone(), None),
        (PublishMode::Live, Err(e)) => (
            ReceiptStatus::Failed,
            (prior_failures + 1).min(max_retries),
            None,
            Some(e.to_string()),
        ),
    };

    let receipt = PlatformReceipt {
        receipt_id: String::new(),
        publish_id: package.publish_id.clone(),
        master_sha256: package.master_sha256.clone(),
        platform: platform.to_string(),
        mode,
        status,
        retry_info: RetryInfo {
            retry_count,
            max_retries,
        },
        attempted_at: Utc::now(),
        platform_video_id: video.as_ref().map(|(id, _)| id.clone()),
        platform_url: video.and_then(|(_, url)| url),
        error: error.clone(),
    };
    let envelope_status = match status {
        ReceiptStatus::Failed => ArtifactStatus::Failed,
        _ => ArtifactStatus::Healthy,
    };
    let mut artifact = Artifact::new(receipt, envelope_status);
    artifact.payload.receipt_id = artifact.id.clone();
    if let Some(error) = error {
        artifact = artifact.with_reason(error);
    }
    artifact
}

pub async fn run(
    ctx: &StageContext,
    platform: &str,
    config: &PublishConfig,
    connector: Option<&dyn PlatformConnector>,
) -> Result<StageReport, StageError> {
    let stage = ArtifactKind::Receipt.service();
    if !is_valid_scope(platform) {
        warn!("Refusing to publish to invalid platform name '{}'", platform);
        return Ok(StageReport::no_op(
            stage,
            ArtifactStatus::Failed,
            format!("invalid platform name '{}'", platform),
        ));
    }
    let Some(_lock) = ctx.try_lock(&publish_lock_path(ctx.root()))? else {
        warn!("Publish lock busy, skipping {} publish", platform);
        return Ok(StageReport::lock_busy(stage));
    };

    let credentials = load_credentials(&config.credentials_dir(ctx.root()), platform).await;
    let mode = credentials.mode();
    if mode == PublishMode::DryRun {
        warn!(
            "Credentials for {} unavailable ({}), publishing in dry_run mode",
            platform,
            credentials.describe()
        );
    }

    let packages = packaged(ctx).await?;
    if packages.is_empty() {
        return Ok(StageReport::no_op(
            stage,
            ArtifactStatus::Degraded,
            "no publish packages",
        ));
    }

    let ledger = PublishLedger::new(&state_dir(ctx.root()));
    let bookkeeping_error = |source: std::io::Error| StageError::Bookkeeping {
        path: state_dir(ctx.root()),
        source,
    };
    let mut entries = ledger.load(platform).await.map_err(bookkeeping_error)?;
    let receipts: Vec<PlatformReceipt> = ctx
        .store
        .history::<PlatformReceipt>(Some(platform))
        .await?
        .into_iter()
        .map(|r| r.payload)
        .collect();
    for entry in reconcile(&mut entries, &receipts) {
        warn!(
            "Receipt {} for {} was missing from the ledger, restoring it",
            entry.receipt_id, entry.publish_id
        );
        ledger.record(&entry).await.map_err(bookkeeping_error)?;
    }

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut status = ArtifactStatus::Healthy;
    let mut last_id = None;
    for package in &packages {
        let key: PairKey = (package.publish_id.clone(), package.master_sha256.clone());
        let prior_failures = match plan(entries.get(&key)) {
            Plan::Attempt(prior) => prior,
            Plan::SkipTerminal => {
                debug!("{} already terminal on {}", package.publish_id, platform);
                skipped += 1;
                continue;
            }
            Plan::SkipExhausted => {
                warn!("{} exhausted its retries on {}", package.publish_id, platform);
                skipped += 1;
                continue;
            }
        };

        let outcome = match mode {
            PublishMode::DryRun => Ok(None),
            PublishMode::Live => attempt(package, &credentials, connector).await,
        };
        if let Err(e) = &outcome {
            warn!("Publish of {} to {} failed: {}", package.publish_id, platform, e);
        }

        let artifact = receipt_artifact(
            package,
            platform,
            mode,
            &outcome,
            prior_failures,
            config.max_retries,
        );
        ctx.store.write(&artifact).await?;
        ledger
            .record(&LedgerEntry::from_receipt(&artifact.payload))
            .await
            .map_err(bookkeeping_error)?;
        info!(
            "{} on {}: {:?}",
            package.publish_id, platform, artifact.payload.status
        );

        status = status.worst(artifact.status);
        written += 1;
        last_id = Some(artifact.id);
    }

    if written == 0 {
        return Ok(StageReport::no_op(
            stage,
            ArtifactStatus::Healthy,
            format!("nothing to publish, {} skipped", skipped),
        ));
    }
    let mode_name = match mode {
        PublishMode::Live => "live",
        PublishMode::DryRun => "dry_run",
    };
    Ok(StageReport {
        stage: stage.to_string(),
        status,
        artifact_id: last_id,
        items: written,
        note: Some(format!("{} receipts ({}), {} skipped", written, mode_name, skipped)),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use artifacts::{ArtifactPayload, ArtifactStore};
    use async_trait::async_trait;

    use super::*;
    use crate::services::publish::{connectors::UploadResult, credentials::OAuthCredentials};

    fn entry(status: ReceiptStatus, retry_count: u32) -> LedgerEntry {
        LedgerEntry {
            platform: "youtube".to_string(),
            publish_id: "PUBID_1".to_string(),
            master_sha256: "a".repeat(64),
            status,
            retry_count,
            max_retries: 3,
            receipt_id: "RCP_x".to_string(),
            recorded_at: Utc::now(),
        }
    }

    fn package() -> PublishPackage {
        PublishPackage {
            publish_id: "PUBID_1".to_string(),
            master_id: "MST_1".to_string(),
            master_sha256: "a".repeat(64),
            master_path: "/m.mp4".to_string(),
            duration_seconds: 45.0,
            title: "t".to_string(),
            description: "d".to_string(),
            hashtags: vec![],
            captions: artifacts::models::publish::Captions {
                source: artifacts::models::publish::CaptionSource::Fallback,
                segments: vec![],
            },
        }
    }

    #[test]
    fn ledger_drives_the_plan() {
        assert_eq!(plan(None), Plan::Attempt(0));
        assert_eq!(plan(Some(&entry(ReceiptStatus::Published, 0))), Plan::SkipTerminal);
        assert_eq!(plan(Some(&entry(ReceiptStatus::DryRun, 0))), Plan::SkipTerminal);
        assert_eq!(plan(Some(&entry(ReceiptStatus::Failed, 2))), Plan::Attempt(2));
        assert_eq!(plan(Some(&entry(ReceiptStatus::Failed, 3))), Plan::SkipExhausted);
    }

    #[test]
    fn failed_attempt_increments_retry_count() {
        let outcome = Err(PublishError::RateLimited);
        let artifact = receipt_artifact(&package(), "youtube", PublishMode::Live, &outcome, 1, 3);
        assert_eq!(artifact.payload.status, ReceiptStatus::Failed);
        assert_eq!(artifact.payload.retry_info.retry_count, 2);
        assert_eq!(artifact.payload.receipt_id, artifact.id);
        assert_eq!(artifact.status, ArtifactStatus::Failed);
        artifact.validate().unwrap();
    }

    #[test]
    fn dry_run_receipt_is_consistent() {
        let artifact = receipt_artifact(&package(), "youtube", PublishMode::DryRun, &Ok(None), 0, 3);
        assert_eq!(artifact.payload.status, ReceiptStatus::DryRun);
        assert_eq!(artifact.payload.scope().as_deref(), Some("youtube"));
        artifact.validate().unwrap();
    }

    #[tokio::test]
    async fn no_packages_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StageContext::new(ArtifactStore::new(dir.path()));
        let report = run(&ctx, "youtube", &PublishConfig::default(), None).await.unwrap();
        assert_eq!(report.status, ArtifactStatus::Degraded);
        assert!(!report.wrote_artifact());
    }

    #[tokio::test]
    async fn invalid_platform_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StageContext::new(ArtifactStore::new(dir.path()));
        let report = run(&ctx, "../etc", &PublishConfig::default(), None).await.unwrap();
        assert_eq!(report.status, ArtifactStatus::Failed);
        assert!(!report.wrote_artifact());
    }

    #[derive(Default)]
    struct CountingConnector {
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl PlatformConnector for CountingConnector {
        fn platform(&self) -> &str {
            "youtube"
        }

        async fn upload(
            &self,
            _credentials: &OAuthCredentials,
            _package: &PublishPackage,
        ) -> Result<UploadResult, PublishError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(UploadResult {
                platform_video_id: "vid".to_string(),
                platform_url: None,
            })
        }
    }

    #[tokio::test]
    async fn published_receipt_without_ledger_line_is_not_uploaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = StageContext::new(ArtifactStore::new(dir.path()));
        let config = PublishConfig::default();
        let creds = config.credentials_dir(dir.path());
        tokio::fs::create_dir_all(&creds).await.unwrap();
        tokio::fs::write(
            creds.join("youtube.json"),
            r#"{"client_id": "id", "client_secret": "s", "refresh_token": "r"}"#,
        )
        .await
        .unwrap();

        let batch = PublishBatch {
            packages: vec![package()],
            ..Default::default()
        };
        ctx.store
            .write(&Artifact::new(batch, ArtifactStatus::Healthy))
            .await
            .unwrap();
        // The receipt landed but the run died before the ledger line did
        let receipt = receipt_artifact(
            &package(),
            "youtube",
            PublishMode::Live,
            &Ok(Some(("vid".to_string(), None))),
            0,
            3,
        );
        ctx.store.write(&receipt).await.unwrap();

        let connector = CountingConnector::default();
        let report = run(&ctx, "youtube", &config, Some(&connector)).await.unwrap();

        assert_eq!(connector.uploads.load(Ordering::SeqCst), 0);
        assert!(!report.wrote_artifact());
        let receipts = ctx.store.history::<PlatformReceipt>(Some("youtube")).await.unwrap();
        assert_eq!(receipts.len(), 1);
        let ledger = PublishLedger::new(&state_dir(dir.path()))
            .load("youtube")
            .await
            .unwrap();
        assert_eq!(ledger.values().next().unwrap().receipt_id, receipt.id);
    }
}
