use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::first_n;
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    pub title: String,
    pub link: String,
    pub source: String,
    pub category: String,
    pub score: f64,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Ok,
    Error,
}

/// Outcome of polling one source during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceStatus {
    pub name: String,
    pub status: SourceState,
    pub items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendSnapshot {
    pub sources: Vec<SourceStatus>,
    pub trends: Vec<Trend>,
}

impl TrendSnapshot {
    pub fn sources_ok(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.status == SourceState::Ok)
            .count()
    }

    pub fn sources_failed(&self) -> usize {
        self.sources.len() - self.sources_ok()
    }
}

impl ArtifactPayload for TrendSnapshot {
    const KIND: ArtifactKind = ArtifactKind::TrendSnapshot;

    fn count(&self) -> usize {
        self.trends.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.trends.iter().any(|t| !t.score.is_finite()) {
            return Err(SchemaError::invariant(Self::KIND, "non-finite trend score"));
        }
        let sorted = self
            .trends
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score);
        if !sorted {
            return Err(SchemaError::invariant(
                Self::KIND,
                "trends are not ordered by score descending",
            ));
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "trends": self.trends.len(),
            "sources_ok": self.sources_ok(),
            "sources_failed": self.sources_failed(),
            "top": first_n(self.trends.iter().map(|t| t.title.as_str())),
        })
    }
}
