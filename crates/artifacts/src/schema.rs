//! JSON Schemas for every artifact kind, envelope included.

use schemars::{Schema, schema_for};

use crate::{
    envelope::{Artifact, ArtifactKind},
    models::{
        asset::AssetBriefBatch,
        competitor::CompetitorAnalysis,
        master::RenderRun,
        metrics::MetricsSnapshot,
        publish::{PlatformReceipt, PublishBatch},
        qa::{AssetQaBatch, ProductionQaBatch},
        research::ResearchBriefs,
        script::{ReviewedScripts, ScriptBatch},
        trend::TrendSnapshot,
    },
};

pub fn artifact_schema(kind: ArtifactKind) -> Schema {
    match kind {
        ArtifactKind::TrendSnapshot => schema_for!(Artifact<TrendSnapshot>),
        ArtifactKind::ResearchBriefs => schema_for!(Artifact<ResearchBriefs>),
        ArtifactKind::CompetitorAnalysis => schema_for!(Artifact<CompetitorAnalysis>),
        ArtifactKind::Scripts => schema_for!(Artifact<ScriptBatch>),
        ArtifactKind::ReviewedScripts => schema_for!(Artifact<ReviewedScripts>),
        ArtifactKind::AssetBriefs => schema_for!(Artifact<AssetBriefBatch>),
        ArtifactKind::AssetQa => schema_for!(Artifact<AssetQaBatch>),
        ArtifactKind::RenderRun => schema_for!(Artifact<RenderRun>),
        ArtifactKind::ProductionQa => schema_for!(Artifact<ProductionQaBatch>),
        ArtifactKind::PublishBatch => schema_for!(Artifact<PublishBatch>),
        ArtifactKind::Receipt => schema_for!(Artifact<PlatformReceipt>),
        ArtifactKind::Metrics => schema_for!(Artifact<MetricsSnapshot>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_an_envelope_schema() {
        for kind in ArtifactKind::ALL {
            let schema = serde_json::to_value(artifact_schema(kind)).unwrap();
            let required = schema["required"].as_array().unwrap();
            for field in ["id", "timestamp", "status", "payload", "meta"] {
                assert!(required.iter().any(|f| f == field), "{:?} lacks {}", kind, field);
            }
        }
    }
}
