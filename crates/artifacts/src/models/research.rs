use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::first_n;
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

pub const MAX_CLAIMS: usize = 5;
pub const MAX_FOLLOWUPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchBrief {
    pub title: String,
    pub source: String,
    pub link: String,
    pub category: String,
    pub claims: Vec<String>,
    pub followups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchBriefs {
    pub briefs: Vec<ResearchBrief>,
}

impl ArtifactPayload for ResearchBriefs {
    const KIND: ArtifactKind = ArtifactKind::ResearchBriefs;

    fn count(&self) -> usize {
        self.briefs.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for brief in &self.briefs {
            if brief.claims.len() > MAX_CLAIMS {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("'{}' carries {} claims", brief.title, brief.claims.len()),
                ));
            }
            if brief.followups.len() > MAX_FOLLOWUPS {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!(
                        "'{}' carries {} follow-ups",
                        brief.title,
                        brief.followups.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "briefs": self.briefs.len(),
            "titles": first_n(self.briefs.iter().map(|b| b.title.as_str())),
        })
    }
}
