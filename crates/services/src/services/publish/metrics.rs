//! Metrics Collector
//!
//! Read-only aggregation over receipt history, the publish ledger and the
//! packaged queue. Takes no lock and never writes bookkeeping files.

use std::collections::{BTreeSet, HashMap};

use artifacts::{
    Artifact, ArtifactKind, ArtifactStatus,
    bookkeeping::{LedgerEntry, PairKey, PublishLedger, reconcile},
    models::{
        metrics::{CredentialState, MetricsSnapshot, PlatformMetrics, QueueSnapshot},
        publish::{PlatformReceipt, PublishPackage, ReceiptStatus, is_valid_scope},
    },
};
use tracing::warn;
use utils::assets::state_dir;

use super::{
    credentials::{Credentials, load_credentials},
    publisher::packaged,
};
use crate::services::{
    config::PublishConfig,
    context::{StageContext, StageError, StageReport},
};

pub fn platform_metrics(
    platform: &str,
    credentials: &Credentials,
    receipts: &[Artifact<PlatformReceipt>],
    packages: &[PublishPackage],
    ledger: &HashMap<PairKey, LedgerEntry>,
) -> PlatformMetrics {
    let count = |status: ReceiptStatus| {
        receipts
            .iter()
            .filter(|r| r.payload.status == status)
            .count()
    };

    let mut pending = 0;
    let mut retryable = 0;
    let mut exhausted = 0;
    for package in packages {
        let key = (package.publish_id.clone(), package.master_sha256.clone());
        match ledger.get(&key) {
            None => pending += 1,
            Some(entry) if entry.status.is_terminal() => {}
            Some(entry) if entry.is_eligible() => retryable += 1,
            Some(_) => exhausted += 1,
        }
    }

    PlatformMetrics {
        platform: platform.to_string(),
        credentials: credentials.state(),
        mode: credentials.mode(),
        receipts: receipts.len(),
        published: count(ReceiptStatus::Published),
        dry_run: count(ReceiptStatus::DryRun),
        failed_attempts: count(ReceiptStatus::Failed),
        pending,
        retryable,
        exhausted,
        last_attempt_at: receipts.iter().map(|r| r.payload.attempted_at).max(),
    }
}

/// Build the snapshot artifact without writing it.
pub async fn collect(
    ctx: &StageContext,
    config: &PublishConfig,
) -> Result<Artifact<MetricsSnapshot>, StageError> {
    let mut platforms: BTreeSet<String> = config
        .platforms
        .iter()
        .filter(|p| {
            let valid = is_valid_scope(p);
            if !valid {
                warn!("Ignoring invalid platform name '{}' in config", p);
            }
            valid
        })
        .cloned()
        .collect();
    platforms.extend(ctx.store.scopes(ArtifactKind::Receipt).await?);

    let packages = packaged(ctx).await?;
    let ledger = PublishLedger::new(&state_dir(ctx.root()));
    let credentials_root = config.credentials_dir(ctx.root());

    let mut snapshot = MetricsSnapshot {
        queue: QueueSnapshot {
            packages_total: packages.len(),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut unavailable = Vec::new();
    for platform in &platforms {
        let credentials = load_credentials(&credentials_root, platform).await;
        let receipts = ctx.store.history::<PlatformReceipt>(Some(platform.as_str())).await?;
        let mut entries = ledger
            .load(platform)
            .await
            .map_err(|source| StageError::Bookkeeping {
                path: state_dir(ctx.root()),
                source,
            })?;

        let payloads: Vec<PlatformReceipt> = receipts.iter().map(|r| r.payload.clone()).collect();
        reconcile(&mut entries, &payloads);

        let metrics = platform_metrics(platform, &credentials, &receipts, &packages, &entries);
        if metrics.credentials == CredentialState::Unavailable {
            unavailable.push(platform.clone());
        }
        snapshot.receipts_total += metrics.receipts;
        snapshot.queue.pending_total += metrics.pending;
        snapshot.queue.retryable_total += metrics.retryable;
        snapshot.platforms.push(metrics);
    }

    if unavailable.is_empty() {
        return Ok(Artifact::new(snapshot, ArtifactStatus::Healthy));
    }
    warn!("Credentials unavailable for: {}", unavailable.join(", "));
    Ok(Artifact::degraded(
        snapshot,
        format!("credentials unavailable for: {}", unavailable.join(", ")),
    ))
}

pub async fn run(ctx: &StageContext, config: &PublishConfig) -> Result<StageReport, StageError> {
    let artifact = collect(ctx, config).await?;
    ctx.finish(&artifact).await
}
