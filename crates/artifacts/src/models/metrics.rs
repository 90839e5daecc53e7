use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::publish::PublishMode;
use crate::envelope::{ArtifactKind, ArtifactPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CredentialState {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformMetrics {
    pub platform: String,
    pub credentials: CredentialState,
    pub mode: PublishMode,
    pub receipts: usize,
    pub published: usize,
    pub dry_run: usize,
    pub failed_attempts: usize,
    /// Packages with no ledger entry for this platform yet.
    pub pending: usize,
    /// Failed publishes that still have retry budget.
    pub retryable: usize,
    /// Failed publishes whose retry budget is spent.
    pub exhausted: usize,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueSnapshot {
    pub packages_total: usize,
    pub pending_total: usize,
    pub retryable_total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricsSnapshot {
    pub platforms: Vec<PlatformMetrics>,
    pub queue: QueueSnapshot,
    pub receipts_total: usize,
}

impl ArtifactPayload for MetricsSnapshot {
    const KIND: ArtifactKind = ArtifactKind::Metrics;

    fn count(&self) -> usize {
        self.platforms.len()
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "platforms": self.platforms.len(),
            "receipts_total": self.receipts_total,
            "pending_total": self.queue.pending_total,
            "unavailable": self
                .platforms
                .iter()
                .filter(|p| p.credentials == CredentialState::Unavailable)
                .map(|p| p.platform.as_str())
                .take(super::SUMMARY_ITEMS)
                .collect::<Vec<_>>(),
        })
    }
}
