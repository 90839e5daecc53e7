use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use utils::ids::{artifact_id, parse_artifact_id};

/// Semantic version stamped into every envelope's `meta.version`.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("malformed artifact id '{0}'")]
    MalformedId(String),
    #[error("artifact id '{id}' does not carry the {expected} prefix")]
    WrongPrefix { id: String, expected: &'static str },
    #[error("meta.service is '{found}', expected '{expected}'")]
    WrongService { found: String, expected: &'static str },
    #[error("meta.count is {found}, payload holds {expected}")]
    CountMismatch { found: usize, expected: usize },
    #[error("degraded artifact without a degraded_reason")]
    MissingReason,
    #[error("{kind} invariant violated: {message}")]
    Invariant { kind: &'static str, message: String },
}

impl SchemaError {
    pub fn invariant(kind: ArtifactKind, message: impl Into<String>) -> Self {
        SchemaError::Invariant {
            kind: kind.dir(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Healthy,
    Partial,
    Degraded,
    Failed,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Healthy => "healthy",
            ArtifactStatus::Partial => "partial",
            ArtifactStatus::Degraded => "degraded",
            ArtifactStatus::Failed => "failed",
        }
    }

    fn severity(self) -> u8 {
        match self {
            ArtifactStatus::Healthy => 0,
            ArtifactStatus::Partial => 1,
            ArtifactStatus::Degraded => 2,
            ArtifactStatus::Failed => 3,
        }
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: ArtifactStatus) -> ArtifactStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every artifact kind the factory produces, with its fixed location,
/// id prefix and producing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    TrendSnapshot,
    ResearchBriefs,
    CompetitorAnalysis,
    Scripts,
    ReviewedScripts,
    AssetBriefs,
    AssetQa,
    RenderRun,
    ProductionQa,
    PublishBatch,
    Receipt,
    Metrics,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 12] = [
        ArtifactKind::TrendSnapshot,
        ArtifactKind::ResearchBriefs,
        ArtifactKind::CompetitorAnalysis,
        ArtifactKind::Scripts,
        ArtifactKind::ReviewedScripts,
        ArtifactKind::AssetBriefs,
        ArtifactKind::AssetQa,
        ArtifactKind::RenderRun,
        ArtifactKind::ProductionQa,
        ArtifactKind::PublishBatch,
        ArtifactKind::Receipt,
        ArtifactKind::Metrics,
    ];

    /// Directory (relative to the factory root) holding `latest.json` and `history/`.
    pub fn dir(&self) -> &'static str {
        match self {
            ArtifactKind::TrendSnapshot => "trends",
            ArtifactKind::ResearchBriefs => "research",
            ArtifactKind::CompetitorAnalysis => "competitors",
            ArtifactKind::Scripts => "scripts",
            ArtifactKind::ReviewedScripts => "reviews",
            ArtifactKind::AssetBriefs => "asset_briefs",
            ArtifactKind::AssetQa => "asset_qa",
            ArtifactKind::RenderRun => "production/renders",
            ArtifactKind::ProductionQa => "production/qa",
            ArtifactKind::PublishBatch => "publish/packages",
            ArtifactKind::Receipt => "publish/receipts",
            ArtifactKind::Metrics => "metrics",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::TrendSnapshot => "TRD",
            ArtifactKind::ResearchBriefs => "RSH",
            ArtifactKind::CompetitorAnalysis => "CMP",
            ArtifactKind::Scripts => "SCR",
            ArtifactKind::ReviewedScripts => "REV",
            ArtifactKind::AssetBriefs => "AST",
            ArtifactKind::AssetQa => "AQA",
            ArtifactKind::RenderRun => "RND",
            ArtifactKind::ProductionQa => "PQA",
            ArtifactKind::PublishBatch => "PUB",
            ArtifactKind::Receipt => "RCP",
            ArtifactKind::Metrics => "MET",
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            ArtifactKind::TrendSnapshot => "trend-detector",
            ArtifactKind::ResearchBriefs => "deep-research-agent",
            ArtifactKind::CompetitorAnalysis => "competitor-analyzer",
            ArtifactKind::Scripts => "script-generator",
            ArtifactKind::ReviewedScripts => "script-reviewer",
            ArtifactKind::AssetBriefs => "asset-brief-builder",
            ArtifactKind::AssetQa => "asset-qa-gate",
            ArtifactKind::RenderRun => "renderer-runner",
            ArtifactKind::ProductionQa => "production-qa-gate",
            ArtifactKind::PublishBatch => "publish-packager",
            ArtifactKind::Receipt => "platform-publisher",
            ArtifactKind::Metrics => "metrics-collector",
        }
    }

    /// Pub/sub topic mirrored for every write of this kind.
    pub fn topic(&self) -> String {
        format!("skybeam.{}", self.dir().replace('/', "."))
    }

    pub fn from_name(name: &str) -> Option<ArtifactKind> {
        let wanted = name.trim().to_lowercase().replace('-', "_");
        ArtifactKind::ALL.into_iter().find(|kind| {
            let serialized = serde_json::to_value(kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string));
            serialized.as_deref() == Some(wanted.as_str()) || kind.dir() == wanted
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactMeta {
    pub service: String,
    pub version: String,
    pub count: usize,
}

/// A typed payload that can live inside an [`Artifact`] envelope.
pub trait ArtifactPayload:
    Serialize + DeserializeOwned + JsonSchema + Clone + Send + Sync + 'static
{
    const KIND: ArtifactKind;

    /// Number of items carried, mirrored into `meta.count`.
    fn count(&self) -> usize;

    /// Payload-level invariants checked at the store boundary.
    fn validate(&self) -> Result<(), SchemaError> {
        Ok(())
    }

    /// Compact event summary. Implementations list at most five items.
    fn summary(&self) -> serde_json::Value;

    /// Optional sub-directory (e.g. a platform name for receipts).
    fn scope(&self) -> Option<String> {
        None
    }
}

/// The shared artifact envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Artifact<P> {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ArtifactStatus,
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub payload: P,
    pub meta: ArtifactMeta,
}

impl<P: ArtifactPayload> Artifact<P> {
    pub fn new(payload: P, status: ArtifactStatus) -> Self {
        let timestamp = Utc::now();
        let meta = ArtifactMeta {
            service: P::KIND.service().to_string(),
            version: SCHEMA_VERSION.to_string(),
            count: payload.count(),
        };
        Self {
            id: artifact_id(P::KIND.prefix(), timestamp),
            timestamp,
            status,
            source_ref: None,
            degraded_reason: None,
            payload,
            meta,
        }
    }

    /// Shorthand for an upstream-missing artifact.
    pub fn degraded(payload: P, reason: impl Into<String>) -> Self {
        Self::new(payload, ArtifactStatus::Degraded).with_reason(reason)
    }

    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.degraded_reason = Some(reason.into());
        self
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, ArtifactStatus::Healthy | ArtifactStatus::Partial)
    }

    /// Envelope and payload checks run on every read and write.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let (prefix, _, _) =
            parse_artifact_id(&self.id).ok_or_else(|| SchemaError::MalformedId(self.id.clone()))?;
        if prefix != P::KIND.prefix() {
            return Err(SchemaError::WrongPrefix {
                id: self.id.clone(),
                expected: P::KIND.prefix(),
            });
        }
        if self.meta.service != P::KIND.service() {
            return Err(SchemaError::WrongService {
                found: self.meta.service.clone(),
                expected: P::KIND.service(),
            });
        }
        let count = self.payload.count();
        if self.meta.count != count {
            return Err(SchemaError::CountMismatch {
                found: self.meta.count,
                expected: count,
            });
        }
        if self.status == ArtifactStatus::Degraded && self.degraded_reason.is_none() {
            return Err(SchemaError::MissingReason);
        }
        self.payload.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trend::TrendSnapshot;

    #[test]
    fn new_envelope_is_valid_and_prefixed() {
        let artifact = Artifact::new(TrendSnapshot::default(), ArtifactStatus::Healthy);
        assert!(artifact.id.starts_with("TRD_"));
        assert_eq!(artifact.meta.service, "trend-detector");
        assert_eq!(artifact.meta.version, SCHEMA_VERSION);
        artifact.validate().unwrap();
    }

    #[test]
    fn degraded_requires_reason() {
        let mut artifact = Artifact::degraded(TrendSnapshot::default(), "no sources");
        artifact.validate().unwrap();
        artifact.degraded_reason = None;
        assert!(matches!(artifact.validate(), Err(SchemaError::MissingReason)));
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let mut artifact = Artifact::new(TrendSnapshot::default(), ArtifactStatus::Healthy);
        artifact.id = artifact.id.replacen("TRD", "RSH", 1);
        assert!(matches!(
            artifact.validate(),
            Err(SchemaError::WrongPrefix { .. })
        ));
    }

    #[test]
    fn worst_status_wins() {
        assert_eq!(
            ArtifactStatus::Healthy.worst(ArtifactStatus::Partial),
            ArtifactStatus::Partial
        );
        assert_eq!(
            ArtifactStatus::Failed.worst(ArtifactStatus::Degraded),
            ArtifactStatus::Failed
        );
    }

    #[test]
    fn kind_lookup_accepts_names_and_dirs() {
        assert_eq!(
            ArtifactKind::from_name("trend-snapshot"),
            Some(ArtifactKind::TrendSnapshot)
        );
        assert_eq!(
            ArtifactKind::from_name("asset_qa"),
            Some(ArtifactKind::AssetQa)
        );
        assert_eq!(ArtifactKind::from_name("nope"), None);
    }
}
