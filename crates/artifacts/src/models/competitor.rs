use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::first_n;
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

pub const MAX_COMPETITORS_PER_TREND: usize = 5;

/// Declaration order is the ranking order: `high` sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Likelihood {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompetitorMatch {
    pub competitor_name: String,
    pub likelihood: Likelihood,
    pub predicted_angle: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendCompetition {
    pub trend_title: String,
    pub category: String,
    pub competitors: Vec<CompetitorMatch>,
    pub differentiation: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompetitorAnalysis {
    pub analyses: Vec<TrendCompetition>,
}

impl CompetitorAnalysis {
    pub fn for_trend(&self, title: &str) -> Option<&TrendCompetition> {
        self.analyses.iter().find(|a| a.trend_title == title)
    }
}

impl ArtifactPayload for CompetitorAnalysis {
    const KIND: ArtifactKind = ArtifactKind::CompetitorAnalysis;

    fn count(&self) -> usize {
        self.analyses.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for analysis in &self.analyses {
            if analysis.competitors.len() > MAX_COMPETITORS_PER_TREND {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("'{}' lists too many competitors", analysis.trend_title),
                ));
            }
            let ordered = analysis
                .competitors
                .windows(2)
                .all(|pair| pair[0].likelihood <= pair[1].likelihood);
            if !ordered {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("'{}' competitors not ranked", analysis.trend_title),
                ));
            }
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "analyses": self.analyses.len(),
            "trends": first_n(self.analyses.iter().map(|a| a.trend_title.as_str())),
        })
    }
}
