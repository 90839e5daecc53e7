//! Append-only idempotency files shared by the publish family.
//!
//! Both files are JSON lines under `state/` and are only written while the
//! publish lock is held. Readers fold the lines; the last entry for a key wins.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;

use crate::models::publish::{PlatformReceipt, ReceiptStatus};

pub const PACKAGED_PAIRS_FILE: &str = "packaged_pairs.jsonl";
pub const PUBLISH_LEDGER_FILE: &str = "publish_ledger.jsonl";

/// `(publish_id, master_sha256)`.
pub type PairKey = (String, String);

async fn read_lines<T: DeserializeOwned>(path: &Path) -> std::io::Result<Vec<T>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut items = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(
                "Skipping malformed line {} in {}: {}",
                lineno + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(items)
}

async fn append<T: Serialize>(path: &Path, item: &T) -> std::io::Result<()> {
    let line = serde_json::to_string(item).map_err(std::io::Error::other)?;
    utils::fs::append_line(path, &line).await
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagedPair {
    pub publish_id: String,
    pub master_sha256: String,
    pub packaged_at: DateTime<Utc>,
}

/// The persisted set of already-packaged pairs.
#[derive(Debug, Clone)]
pub struct PackagedPairs {
    path: PathBuf,
}

impl PackagedPairs {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(PACKAGED_PAIRS_FILE),
        }
    }

    pub async fn load(&self) -> std::io::Result<HashSet<PairKey>> {
        let pairs: Vec<PackagedPair> = read_lines(&self.path).await?;
        Ok(pairs
            .into_iter()
            .map(|p| (p.publish_id, p.master_sha256))
            .collect())
    }

    pub async fn record(&self, publish_id: &str, master_sha256: &str) -> std::io::Result<()> {
        append(
            &self.path,
            &PackagedPair {
                publish_id: publish_id.to_string(),
                master_sha256: master_sha256.to_string(),
                packaged_at: Utc::now(),
            },
        )
        .await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub platform: String,
    pub publish_id: String,
    pub master_sha256: String,
    pub status: ReceiptStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub receipt_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_receipt(receipt: &PlatformReceipt) -> Self {
        Self {
            platform: receipt.platform.clone(),
            publish_id: receipt.publish_id.clone(),
            master_sha256: receipt.master_sha256.clone(),
            status: receipt.status,
            retry_count: receipt.retry_info.retry_count,
            max_retries: receipt.retry_info.max_retries,
            receipt_id: receipt.receipt_id.clone(),
            recorded_at: receipt.attempted_at,
        }
    }

    /// Whether a further attempt is allowed.
    pub fn is_eligible(&self) -> bool {
        !self.status.is_terminal() && self.retry_count < self.max_retries
    }
}

/// Per-platform publish ledger; one line per attempt.
#[derive(Debug, Clone)]
pub struct PublishLedger {
    path: PathBuf,
}

impl PublishLedger {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(PUBLISH_LEDGER_FILE),
        }
    }

    /// Latest entry per `(publish_id, master_sha256)` for `platform`.
    pub async fn load(&self, platform: &str) -> std::io::Result<HashMap<PairKey, LedgerEntry>> {
        let entries: Vec<LedgerEntry> = read_lines(&self.path).await?;
        let mut folded = HashMap::new();
        for entry in entries.into_iter().filter(|e| e.platform == platform) {
            folded.insert(
                (entry.publish_id.clone(), entry.master_sha256.clone()),
                entry,
            );
        }
        Ok(folded)
    }

    pub async fn record(&self, entry: &LedgerEntry) -> std::io::Result<()> {
        append(&self.path, entry).await
    }
}

/// Fold receipts that never reached the ledger into `entries`.
///
/// A receipt is written before its ledger line, so a crash between the two
/// leaves a receipt the ledger does not know about. Receipt ids sort by
/// time, so a receipt newer than the ledger's latest entry for its pair
/// replaces it. Returns the entries that were missing.
pub fn reconcile(
    entries: &mut HashMap<PairKey, LedgerEntry>,
    receipts: &[PlatformReceipt],
) -> Vec<LedgerEntry> {
    let mut repaired: Vec<LedgerEntry> = Vec::new();
    for receipt in receipts {
        let key = (receipt.publish_id.clone(), receipt.master_sha256.clone());
        let newer = entries
            .get(&key)
            .is_none_or(|known| known.receipt_id < receipt.receipt_id);
        if newer {
            let entry = LedgerEntry::from_receipt(receipt);
            repaired.retain(|e| (&e.publish_id, &e.master_sha256) != (&key.0, &key.1));
            repaired.push(entry.clone());
            entries.insert(key, entry);
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: ReceiptStatus, retry_count: u32) -> LedgerEntry {
        LedgerEntry {
            platform: "youtube".to_string(),
            publish_id: "PUBID_1".to_string(),
            master_sha256: "a".repeat(64),
            status,
            retry_count,
            max_retries: 3,
            receipt_id: format!("RCP_{}", retry_count),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn packaged_pairs_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let pairs = PackagedPairs::new(dir.path());
        assert!(pairs.load().await.unwrap().is_empty());

        pairs.record("PUBID_1", "abc").await.unwrap();
        pairs.record("PUBID_1", "abc").await.unwrap();
        pairs.record("PUBID_2", "def").await.unwrap();

        let loaded = pairs.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&("PUBID_1".to_string(), "abc".to_string())));
    }

    #[tokio::test]
    async fn ledger_keeps_last_entry_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = PublishLedger::new(dir.path());
        ledger.record(&entry(ReceiptStatus::Failed, 1)).await.unwrap();
        utils::fs::append_line(&dir.path().join(PUBLISH_LEDGER_FILE), "{broken")
            .await
            .unwrap();
        ledger.record(&entry(ReceiptStatus::Failed, 2)).await.unwrap();

        let folded = ledger.load("youtube").await.unwrap();
        assert_eq!(folded.len(), 1);
        let latest = folded.values().next().unwrap();
        assert_eq!(latest.retry_count, 2);
        assert!(latest.is_eligible());

        assert!(ledger.load("tiktok").await.unwrap().is_empty());
    }

    fn receipt(receipt_id: &str, status: ReceiptStatus, retry_count: u32) -> PlatformReceipt {
        use crate::models::publish::{PublishMode, RetryInfo};
        PlatformReceipt {
            receipt_id: receipt_id.to_string(),
            publish_id: "PUBID_1".to_string(),
            master_sha256: "a".repeat(64),
            platform: "youtube".to_string(),
            mode: PublishMode::Live,
            status,
            retry_info: RetryInfo {
                retry_count,
                max_retries: 3,
            },
            attempted_at: Utc::now(),
            platform_video_id: (status == ReceiptStatus::Published).then(|| "vid".to_string()),
            platform_url: None,
            error: (status == ReceiptStatus::Failed).then(|| "rate limited".to_string()),
        }
    }

    #[test]
    fn receipts_missing_from_the_ledger_are_folded_in() {
        let mut entries = HashMap::new();
        let stale = entry(ReceiptStatus::Failed, 1);
        entries.insert(
            (stale.publish_id.clone(), stale.master_sha256.clone()),
            stale.clone(),
        );

        // RCP_1 is already recorded; RCP_2 was written but its ledger line was lost
        let receipts = vec![
            receipt("RCP_1", ReceiptStatus::Failed, 1),
            receipt("RCP_2", ReceiptStatus::Published, 1),
        ];
        let repaired = reconcile(&mut entries, &receipts);

        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].receipt_id, "RCP_2");
        let folded = entries.values().next().unwrap();
        assert_eq!(folded.status, ReceiptStatus::Published);
        assert!(!folded.is_eligible());

        assert!(reconcile(&mut entries, &receipts).is_empty());
    }

    #[test]
    fn eligibility_rules() {
        assert!(!entry(ReceiptStatus::Published, 0).is_eligible());
        assert!(!entry(ReceiptStatus::DryRun, 0).is_eligible());
        assert!(!entry(ReceiptStatus::Failed, 3).is_eligible());
        assert!(entry(ReceiptStatus::Failed, 2).is_eligible());
    }
}
