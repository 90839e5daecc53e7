use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::first_n;
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

/// Stream-probe result: what the file actually contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProbeSummary {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub frame_rate: f64,
}

impl ProbeSummary {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// Verifiable proof of a rendered file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileProof {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
    pub probe_summary: ProbeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MasterManifest {
    pub master_id: String,
    pub brief_id: String,
    pub script_id: String,
    pub title: String,
    pub rendered_at: DateTime<Utc>,
    pub file_proof: FileProof,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderFailure {
    pub brief_id: String,
    pub script_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub max_duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderRun {
    pub target: RenderTarget,
    pub masters: Vec<MasterManifest>,
    pub failures: Vec<RenderFailure>,
}

impl RenderRun {
    pub fn empty(target: RenderTarget) -> Self {
        Self {
            target,
            masters: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn find(&self, master_id: &str) -> Option<&MasterManifest> {
        self.masters.iter().find(|m| m.master_id == master_id)
    }
}

pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl ArtifactPayload for RenderRun {
    const KIND: ArtifactKind = ArtifactKind::RenderRun;

    fn count(&self) -> usize {
        self.masters.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for master in &self.masters {
            if !is_sha256_hex(&master.file_proof.sha256) {
                return Err(SchemaError::invariant(
                    Self::KIND,
                    format!("{} has a malformed sha256", master.master_id),
                ));
            }
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "masters": self.masters.len(),
            "failures": self.failures.len(),
            "master_ids": first_n(self.masters.iter().map(|m| m.master_id.as_str())),
        })
    }
}
