//! Asset Brief Builder
//!
//! Expands every approved script into a per-scene asset brief: one scene
//! per script section on a contiguous timeline, a per-format visual style and
//! asset list, and a trademark screen of the title.

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::{
        asset::{
            AssetBrief, AssetBriefBatch, AssetType, Compliance, ComplianceStatus, RequiredAsset,
            Scene, format_timecode,
        },
        script::{FormatTier, ReviewedScripts, Script},
    },
};
use tracing::{info, warn};
use utils::hash::sha256_hex;

use crate::services::{
    config::AssetsConfig,
    context::{StageContext, StageError, StageReport},
    scripts::reviewer::strip_tag,
    trends::scoring::{contains_term, normalize_title},
};

/// Deterministic per script, so rebuilt briefs keep their id.
pub fn brief_id(script_id: &str) -> String {
    format!("BRF_{}", &sha256_hex(script_id)[..12])
}

pub fn visual_style(format: FormatTier) -> &'static str {
    match format {
        FormatTier::Short => "bold kinetic typography on high-contrast vertical frames",
        FormatTier::Standard => "clean explainer graphics with annotated lower thirds",
        FormatTier::Long => "documentary pacing with diagram-led b-roll",
    }
}

pub fn required_assets(format: FormatTier) -> Vec<RequiredAsset> {
    let table: &[(AssetType, u32)] = match format {
        FormatTier::Short => &[
            (AssetType::Thumbnail, 1),
            (AssetType::TitleCard, 1),
            (AssetType::BRoll, 2),
        ],
        FormatTier::Standard => &[
            (AssetType::Thumbnail, 1),
            (AssetType::IntroCard, 1),
            (AssetType::OutroCard, 1),
            (AssetType::TitleCard, 2),
            (AssetType::LowerThird, 2),
            (AssetType::BRoll, 4),
        ],
        FormatTier::Long => &[
            (AssetType::Thumbnail, 1),
            (AssetType::IntroCard, 1),
            (AssetType::OutroCard, 1),
            (AssetType::TitleCard, 3),
            (AssetType::LowerThird, 4),
            (AssetType::BRoll, 8),
        ],
    };
    table
        .iter()
        .map(|(asset_type, quantity)| RequiredAsset {
            asset_type: *asset_type,
            quantity: *quantity,
        })
        .collect()
}

fn requires(assets: &[RequiredAsset], asset_type: AssetType) -> bool {
    assets.iter().any(|a| a.asset_type == asset_type)
}

/// Asset types shown in each scene, by position. The thumbnail is a
/// standalone deliverable and never mapped to a scene.
fn scene_asset_types(index: usize, total: usize, assets: &[RequiredAsset]) -> Vec<AssetType> {
    let mut opening = Vec::new();
    if requires(assets, AssetType::IntroCard) {
        opening.push(AssetType::IntroCard);
    }
    opening.push(AssetType::TitleCard);

    let mut body = vec![AssetType::BRoll];
    if requires(assets, AssetType::LowerThird) {
        body.push(AssetType::LowerThird);
    }

    let closing = if requires(assets, AssetType::OutroCard) {
        vec![AssetType::OutroCard]
    } else {
        vec![AssetType::TitleCard]
    };

    let mut types = match (index, total) {
        (_, 1) => [opening, body, closing].concat(),
        (0, _) => opening,
        (i, n) if i + 1 == n && n == 2 => [body, closing].concat(),
        (i, n) if i + 1 == n => closing,
        _ => body,
    };
    types.dedup();
    types
}

pub fn screen_trademarks(title: &str, config: &AssetsConfig) -> Compliance {
    let normalized = normalize_title(title);
    let terms: Vec<String> = config
        .trademark_terms
        .iter()
        .filter(|t| contains_term(&normalized, t))
        .cloned()
        .collect();
    if terms.is_empty() {
        Compliance {
            status: ComplianceStatus::Clear,
            trademark_terms: terms,
            notes: "No trademark-risk terms detected".to_string(),
        }
    } else {
        Compliance {
            status: ComplianceStatus::Review,
            notes: format!(
                "Title references {}; confirm nominative use before publishing",
                terms.join(", ")
            ),
            trademark_terms: terms,
        }
    }
}

pub fn build_brief(script: &Script, config: &AssetsConfig) -> AssetBrief {
    let style = visual_style(script.format);
    let assets = required_assets(script.format);
    let total = script.sections.len();

    let mut cursor = 0u32;
    let scene_map = script
        .sections
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let t_start = cursor;
            let t_end = cursor + section.duration_seconds;
            cursor = t_end;
            let body = strip_tag(&section.content);
            let visual_prompt = if body.is_empty() {
                format!("{} for the {} section", style, section.section_name)
            } else {
                format!("{}: {}", style, body)
            };
            Scene {
                scene_id: format!("scene_{:02}", i + 1),
                section_name: section.section_name.clone(),
                t_start,
                t_end,
                timecode_start: format_timecode(t_start),
                timecode_end: format_timecode(t_end),
                visual_prompt,
                storyboard_frame: format!("frame_{:02}", i + 1),
                asset_types: scene_asset_types(i, total, &assets),
            }
        })
        .collect();

    AssetBrief {
        brief_id: brief_id(&script.id),
        script_id: script.id.clone(),
        title: script.trend_title.clone(),
        format: script.format,
        duration_seconds: cursor,
        visual_style: style.to_string(),
        required_assets: assets,
        scene_map,
        compliance: screen_trademarks(&script.trend_title, config),
    }
}

pub fn build(upstream: Upstream<ReviewedScripts>, config: &AssetsConfig) -> Artifact<AssetBriefBatch> {
    let reviewed = match upstream {
        Upstream::Ready(reviewed) => reviewed,
        Upstream::Missing(reason) => {
            warn!("Asset brief upstream missing: {}", reason);
            return Artifact::degraded(AssetBriefBatch::default(), reason);
        }
    };

    let briefs: Vec<AssetBrief> = reviewed
        .payload
        .approved()
        .map(|entry| build_brief(&entry.script, config))
        .collect();
    if briefs.is_empty() {
        return Artifact::degraded(AssetBriefBatch::default(), "no approved scripts")
            .with_source_ref(reviewed.id);
    }
    info!("Built {} asset briefs", briefs.len());

    let status = match reviewed.status {
        ArtifactStatus::Healthy => ArtifactStatus::Healthy,
        _ => ArtifactStatus::Partial,
    };
    Artifact::new(AssetBriefBatch { briefs }, status).with_source_ref(reviewed.id)
}

pub async fn run(ctx: &StageContext, config: &AssetsConfig) -> Result<StageReport, StageError> {
    let upstream = ctx.store.upstream::<ReviewedScripts>().await;
    let artifact = build(upstream, config);
    ctx.finish(&artifact).await
}
