use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::first_n;
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormatTier {
    Short,
    Standard,
    Long,
}

impl FormatTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTier::Short => "short",
            FormatTier::Standard => "standard",
            FormatTier::Long => "long",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptSection {
    pub section_name: String,
    pub content: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Script {
    pub id: String,
    pub trend_title: String,
    pub template_id: String,
    pub format: FormatTier,
    pub category: String,
    pub source: String,
    pub hook: String,
    pub sections: Vec<ScriptSection>,
    pub variables: BTreeMap<String, String>,
    pub differentiation: Vec<String>,
    pub estimated_duration: u32,
}

impl Script {
    pub fn check_structure(&self) -> Result<(), String> {
        if self.sections.is_empty() {
            return Err(format!("script {} has no sections", self.id));
        }
        let total: u32 = self.sections.iter().map(|s| s.duration_seconds).sum();
        if total != self.estimated_duration {
            return Err(format!(
                "script {} sections sum to {}s, estimated_duration is {}s",
                self.id, total, self.estimated_duration
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptBatch {
    pub scripts: Vec<Script>,
}

impl ArtifactPayload for ScriptBatch {
    const KIND: ArtifactKind = ArtifactKind::Scripts;

    fn count(&self) -> usize {
        self.scripts.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for script in &self.scripts {
            script
                .check_structure()
                .map_err(|msg| SchemaError::invariant(Self::KIND, msg))?;
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "scripts": self.scripts.len(),
            "titles": first_n(self.scripts.iter().map(|s| s.trend_title.as_str())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewScores {
    pub hook: u8,
    pub depth: u8,
    pub flow: u8,
    pub differentiation: u8,
    pub overall: u8,
}

impl ReviewScores {
    /// Overall is the integer (floor) average of the four sub-scores.
    pub fn from_parts(hook: u8, depth: u8, flow: u8, differentiation: u8) -> Self {
        let sum = hook as u32 + depth as u32 + flow as u32 + differentiation as u32;
        Self {
            hook,
            depth,
            flow,
            differentiation,
            overall: (sum / 4) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    NeedsRevision,
    Rejected,
}

impl ReviewStatus {
    /// `approved` at or above `approve_at`, `rejected` at or below `reject_at`.
    pub fn from_overall(overall: u8, approve_at: u8, reject_at: u8) -> Self {
        if overall >= approve_at {
            ReviewStatus::Approved
        } else if overall <= reject_at {
            ReviewStatus::Rejected
        } else {
            ReviewStatus::NeedsRevision
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewResult {
    pub script_id: String,
    pub scores: ReviewScores,
    pub review_status: ReviewStatus,
    pub revision_needed: Vec<String>,
    pub production_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewedScript {
    pub script: Script,
    pub review: ReviewResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewedScripts {
    pub approve_threshold: u8,
    pub reject_threshold: u8,
    pub reviewed: Vec<ReviewedScript>,
}

impl Default for ReviewedScripts {
    fn default() -> Self {
        Self {
            approve_threshold: 7,
            reject_threshold: 4,
            reviewed: Vec::new(),
        }
    }
}

impl ReviewedScripts {
    pub fn approved(&self) -> impl Iterator<Item = &ReviewedScript> {
        self.reviewed
            .iter()
            .filter(|r| r.review.review_status == ReviewStatus::Approved)
    }

    pub fn find_script(&self, script_id: &str) -> Option<&Script> {
        self.reviewed
            .iter()
            .map(|r| &r.script)
            .find(|s| s.id == script_id)
    }
}

impl ArtifactPayload for ReviewedScripts {
    const KIND: ArtifactKind = ArtifactKind::ReviewedScripts;

    fn count(&self) -> usize {
        self.reviewed.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for entry in &self.reviewed {
            let review = &entry.review;
            let s = review.scores;
            let parts = [s.hook, s.depth, s.flow, s.differentiation];
            if parts.iter().any(|p| !(1..=10).contains(p)) {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} has a sub-score outside 1-10", review.script_id),
                ));
            }
            let expected = ReviewScores::from_parts(s.hook, s.depth, s.flow, s.differentiation);
            if expected.overall != s.overall {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} overall is not the sub-score average", review.script_id),
                ));
            }
            let status =
                ReviewStatus::from_overall(s.overall, self.approve_threshold, self.reject_threshold);
            if status != review.review_status {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} review_status disagrees with overall", review.script_id),
                ));
            }
            let ready = status == ReviewStatus::Approved && review.revision_needed.is_empty();
            if ready != review.production_ready {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} production_ready is inconsistent", review.script_id),
                ));
            }
            entry
                .script
                .check_structure()
                .map_err(|msg| SchemaError::invariant(Self::KIND, msg))?;
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "reviewed": self.reviewed.len(),
            "approved": self.approved().count(),
            "production_ready": self.reviewed.iter().filter(|r| r.review.production_ready).count(),
            "approved_titles": first_n(self.approved().map(|r| r.script.trend_title.as_str())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_is_floor_average() {
        let scores = ReviewScores::from_parts(8, 7, 9, 6);
        assert_eq!(scores.overall, 7);
        let scores = ReviewScores::from_parts(5, 5, 5, 4);
        assert_eq!(scores.overall, 4);
    }

    #[test]
    fn status_boundaries() {
        assert_eq!(ReviewStatus::from_overall(7, 7, 4), ReviewStatus::Approved);
        assert_eq!(ReviewStatus::from_overall(10, 7, 4), ReviewStatus::Approved);
        assert_eq!(ReviewStatus::from_overall(6, 7, 4), ReviewStatus::NeedsRevision);
        assert_eq!(ReviewStatus::from_overall(5, 7, 4), ReviewStatus::NeedsRevision);
        assert_eq!(ReviewStatus::from_overall(4, 7, 4), ReviewStatus::Rejected);
        assert_eq!(ReviewStatus::from_overall(1, 7, 4), ReviewStatus::Rejected);
    }

    #[test]
    fn section_durations_must_sum() {
        let script = Script {
            id: "SCP_1".to_string(),
            trend_title: "t".to_string(),
            template_id: "explainer".to_string(),
            format: FormatTier::Short,
            category: "ai".to_string(),
            source: "feed".to_string(),
            hook: "h".to_string(),
            sections: vec![ScriptSection {
                section_name: "hook".to_string(),
                content: "[HOOK]".to_string(),
                duration_seconds: 10,
            }],
            variables: BTreeMap::new(),
            differentiation: vec![],
            estimated_duration: 12,
        };
        assert!(script.check_structure().is_err());
    }
}
