use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{first_n, script::FormatTier};
use crate::envelope::{ArtifactKind, ArtifactPayload, SchemaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Thumbnail,
    IntroCard,
    OutroCard,
    TitleCard,
    LowerThird,
    BRoll,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Thumbnail => "thumbnail",
            AssetType::IntroCard => "intro_card",
            AssetType::OutroCard => "outro_card",
            AssetType::TitleCard => "title_card",
            AssetType::LowerThird => "lower_third",
            AssetType::BRoll => "b_roll",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequiredAsset {
    pub asset_type: AssetType,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub scene_id: String,
    pub section_name: String,
    pub t_start: u32,
    pub t_end: u32,
    pub timecode_start: String,
    pub timecode_end: String,
    pub visual_prompt: String,
    pub storyboard_frame: String,
    pub asset_types: Vec<AssetType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Clear,
    Review,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Compliance {
    pub status: ComplianceStatus,
    pub trademark_terms: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetBrief {
    pub brief_id: String,
    pub script_id: String,
    pub title: String,
    pub format: FormatTier,
    pub duration_seconds: u32,
    pub visual_style: String,
    pub required_assets: Vec<RequiredAsset>,
    pub scene_map: Vec<Scene>,
    pub compliance: Compliance,
}

impl AssetBrief {
    /// Scenes must tile `[0, duration_seconds]` with no gaps or overlaps.
    pub fn check_partition(&self) -> Result<(), String> {
        if self.scene_map.is_empty() {
            return Err(format!("brief {} has no scenes", self.brief_id));
        }
        let mut cursor = 0u32;
        for scene in &self.scene_map {
            if scene.t_start != cursor {
                return Err(format!(
                    "scene {} starts at {}s, expected {}s",
                    scene.scene_id, scene.t_start, cursor
                ));
            }
            if scene.t_end < scene.t_start {
                return Err(format!("scene {} ends before it starts", scene.scene_id));
            }
            cursor = scene.t_end;
        }
        if cursor != self.duration_seconds {
            return Err(format!(
                "scenes end at {}s, brief lasts {}s",
                cursor, self.duration_seconds
            ));
        }
        Ok(())
    }
}

/// `HH:MM:SS.mmm` for a whole-second offset.
pub fn format_timecode(seconds: u32) -> String {
    format!(
        "{:02}:{:02}:{:02}.000",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetBriefBatch {
    pub briefs: Vec<AssetBrief>,
}

impl AssetBriefBatch {
    pub fn find(&self, brief_id: &str) -> Option<&AssetBrief> {
        self.briefs.iter().find(|b| b.brief_id == brief_id)
    }
}

impl ArtifactPayload for AssetBriefBatch {
    const KIND: ArtifactKind = ArtifactKind::AssetBriefs;

    fn count(&self) -> usize {
        self.briefs.len()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for brief in &self.briefs {
            brief
                .check_partition()
                .map_err(|msg| SchemaError::invariant(Self::KIND, msg))?;
        }
        Ok(())
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "briefs": self.briefs.len(),
            "compliance_review": self
                .briefs
                .iter()
                .filter(|b| b.compliance.status == ComplianceStatus::Review)
                .count(),
            "titles": first_n(self.briefs.iter().map(|b| b.title.as_str())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, start: u32, end: u32) -> Scene {
        Scene {
            scene_id: id.to_string(),
            section_name: id.to_string(),
            t_start: start,
            t_end: end,
            timecode_start: format_timecode(start),
            timecode_end: format_timecode(end),
            visual_prompt: "prompt".to_string(),
            storyboard_frame: format!("frame_{}", id),
            asset_types: vec![],
        }
    }

    fn brief(scenes: Vec<Scene>, duration: u32) -> AssetBrief {
        AssetBrief {
            brief_id: "B1".to_string(),
            script_id: "S1".to_string(),
            title: "t".to_string(),
            format: FormatTier::Short,
            duration_seconds: duration,
            visual_style: "style".to_string(),
            required_assets: vec![],
            scene_map: scenes,
            compliance: Compliance {
                status: ComplianceStatus::Clear,
                trademark_terms: vec![],
                notes: String::new(),
            },
        }
    }

    #[test]
    fn contiguous_scenes_partition() {
        let b = brief(vec![scene("a", 0, 10), scene("b", 10, 50), scene("c", 50, 60)], 60);
        assert!(b.check_partition().is_ok());
    }

    #[test]
    fn gaps_and_short_coverage_are_rejected() {
        let gap = brief(vec![scene("a", 0, 10), scene("b", 12, 60)], 60);
        assert!(gap.check_partition().is_err());
        let short = brief(vec![scene("a", 0, 10)], 60);
        assert!(short.check_partition().is_err());
    }

    #[test]
    fn timecodes() {
        assert_eq!(format_timecode(0), "00:00:00.000");
        assert_eq!(format_timecode(75), "00:01:15.000");
        assert_eq!(format_timecode(3725), "01:02:05.000");
    }
}
