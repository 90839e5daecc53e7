use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{first_n, master::is_sha256_hex};
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSegment {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptionSource {
    Narration,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Captions {
    pub source: CaptionSource,
    pub segments: Vec<CaptionSegment>,
}

impl Captions {
    /// Segments are time-ordered, non-overlapping and end within `duration`.
    pub fn check_timing(&self, duration: f64) -> Result<(), String> {
        let mut previous_end = 0.0f64;
        for segment in &self.segments {
            if segment.start_time < 0.0 || segment.end_time <= segment.start_time {
                return Err(format!("caption {} has an empty or negative span", segment.index));
            }
            if segment.start_time + TIME_EPSILON < previous_end {
                return Err(format!("caption {} overlaps its predecessor", segment.index));
            }
            previous_end = segment.end_time;
        }
        if previous_end > duration + TIME_EPSILON {
            return Err(format!(
                "captions end at {:.3}s beyond source duration {:.3}s",
                previous_end, duration
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PublishPackage {
    pub publish_id: String,
    pub master_id: String,
    pub master_sha256: String,
    pub master_path: String,
    pub duration_seconds: f64,
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    pub captions: Captions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PublishBatch {
    pub packages: Vec<PublishPackage>,
    /// Publish ids whose `(publish_id, master_sha256)` pair was already packaged.
    pub skipped: Vec<String>,
}

impl ArtifactPayload for PublishBatch {
    const KIND: ArtifactKind = ArtifactKind::PublishBatch;

    fn count(&self) -> usize {
        self.packages.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for package in &self.packages {
            if !is_sha256_hex(&package.master_sha256) {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} has a malformed master_sha256", package.publish_id),
                ));
            }
            package
                .captions
                .check_timing(package.duration_seconds)
                .map_err(|msg| SchemaError::invariant(Self::KIND, msg))?;
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "packages": self.packages.len(),
            "skipped": self.skipped.len(),
            "publish_ids": first_n(self.packages.iter().map(|p| p.publish_id.as_str())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    DryRun,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Published,
    DryRun,
    Failed,
}

impl ReceiptStatus {
    /// Terminal publishes are never attempted again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReceiptStatus::Published | ReceiptStatus::DryRun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetryInfo {
    pub retry_count: u32,
    pub max_retries: u32,
}

impl RetryInfo {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Immutable record of one publish attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformReceipt {
    pub receipt_id: String,
    pub publish_id: String,
    pub master_sha256: String,
    pub platform: String,
    pub mode: PublishMode,
    pub status: ReceiptStatus,
    pub retry_info: RetryInfo,
    pub attempted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArtifactPayload for PlatformReceipt {
    const KIND: ArtifactKind = ArtifactKind::Receipt;

    fn count(&self) -> usize {
        1
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let consistent = match self.mode {
            PublishMode::DryRun => self.status == ReceiptStatus::DryRun,
            PublishMode::Live => self.status != ReceiptStatus::DryRun,
        };
        if !consistent {
            return Err(SchemaError::invariant(
                Self::KIND,
                format!("{} status does not match its mode", self.receipt_id),
            ));
        }
        if self.retry_info.retry_count > self.retry_info.max_retries {
            return Err(SchemaError::invariant(
                Self::KIND,
                format!("{} exceeds max_retries", self.receipt_id),
            ));
        }
        if !is_valid_scope(&self.platform) {
            return Err(SchemaError::invariant(
                Self::KIND,
                format!("platform '{}' is not a valid name", self.platform),
            ));
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "publish_id": self.publish_id,
            "platform": self.platform,
            "mode": self.mode,
            "status": self.status,
            "retry_count": self.retry_info.retry_count,
        })
    }

    fn scope(&self) -> Option<String> {
        Some(self.platform.clone())
    }
}

/// Platform names double as directory names.
pub fn is_valid_scope(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
