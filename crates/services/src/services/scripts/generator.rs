//! Script Generator
//!
//! One script per researched trend: pick a template, size its sections from
//! the template's percentage split of the target duration, and fill each
//! section with a bracketed content tag plus whatever research backs it.

use std::collections::BTreeMap;

use artifacts::{
    Artifact, ArtifactStatus, Upstream,
    models::{
        competitor::{CompetitorAnalysis, TrendCompetition},
        research::{ResearchBrief, ResearchBriefs},
        script::{Script, ScriptBatch, ScriptSection},
    },
};
use chrono::Utc;
use tracing::{debug, info, warn};
use utils::ids::artifact_id;

use super::templates::select_template;
use crate::services::{
    config::{ScriptsConfig, TemplateConfig},
    context::{StageContext, StageError, StageReport},
};

pub const SCRIPT_ID_PREFIX: &str = "SCP";

/// `[PURPOSE]` tag for a section.
pub fn section_tag(purpose: &str) -> String {
    format!("[{}]", purpose.trim().to_uppercase().replace(' ', "_"))
}

/// Floor of each section's share; the rounding remainder goes to the last
/// section so the total is exact.
pub fn section_durations(template: &TemplateConfig, target: u32) -> Vec<u32> {
    let mut durations: Vec<u32> = template
        .sections
        .iter()
        .map(|s| target * s.percent / 100)
        .collect();
    let allocated: u32 = durations.iter().sum();
    if let Some(last) = durations.last_mut() {
        *last += target.saturating_sub(allocated);
    }
    durations
}

pub fn substitute(pattern: &str, variables: &BTreeMap<String, String>) -> String {
    variables
        .iter()
        .fold(pattern.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{}}}", key), value)
        })
}

pub fn script_variables(brief: &ResearchBrief) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("topic".to_string(), brief.title.clone()),
        ("source".to_string(), brief.source.clone()),
        ("category".to_string(), brief.category.clone()),
    ])
}

pub fn build_script(
    brief: &ResearchBrief,
    template: &TemplateConfig,
    competition: Option<&TrendCompetition>,
    config: &ScriptsConfig,
) -> Script {
    let variables = script_variables(brief);
    let hook = substitute(&template.hook_pattern, &variables);
    let target = template.target_duration();
    let durations = section_durations(template, target);

    // The "Main topic" restatement duplicates the title
    let mut claims = brief.claims.iter().skip(1);

    let sections = template
        .sections
        .iter()
        .zip(durations)
        .map(|(spec, duration_seconds)| {
            let tag = section_tag(&spec.purpose);
            let content = match spec.purpose.as_str() {
                "hook" => format!("{} {}", tag, hook),
                "cta" => format!("{} {}", tag, substitute(&config.cta_line, &variables)),
                _ => match claims.next() {
                    Some(claim) => format!("{} {}", tag, claim),
                    None => tag,
                },
            };
            ScriptSection {
                section_name: spec.name.clone(),
                content,
                duration_seconds,
            }
        })
        .collect();

    Script {
        id: artifact_id(SCRIPT_ID_PREFIX, Utc::now()),
        trend_title: brief.title.clone(),
        template_id: template.id.clone(),
        format: template.format,
        category: brief.category.clone(),
        source: brief.source.clone(),
        hook,
        sections,
        variables,
        differentiation: competition
            .map(|c| c.differentiation.clone())
            .unwrap_or_default(),
        estimated_duration: target,
    }
}

pub fn generate(
    research: Upstream<ResearchBriefs>,
    competitors: Upstream<CompetitorAnalysis>,
    config: &ScriptsConfig,
) -> Artifact<ScriptBatch> {
    let research = match research {
        Upstream::Ready(research) => research,
        Upstream::Missing(reason) => {
            warn!("Script upstream missing: {}", reason);
            return Artifact::degraded(ScriptBatch::default(), reason);
        }
    };
    if research.payload.briefs.is_empty() {
        return Artifact::degraded(ScriptBatch::default(), "no research briefs to script")
            .with_source_ref(research.id);
    }

    let mut notes = Vec::new();
    let analysis = match competitors {
        Upstream::Ready(analysis) => Some(analysis),
        Upstream::Missing(reason) => {
            warn!("Competitor analysis unavailable, scripting without differentiation: {}", reason);
            notes.push(reason);
            None
        }
    };

    let mut scripts = Vec::new();
    for brief in &research.payload.briefs {
        let Some(template) = select_template(brief, config) else {
            notes.push("no script templates configured".to_string());
            break;
        };
        debug!("Template {} selected for '{}'", template.id, brief.title);
        let competition = analysis
            .as_ref()
            .and_then(|a| a.payload.for_trend(&brief.title));
        scripts.push(build_script(brief, template, competition, config));
    }
    info!("Generated {} scripts", scripts.len());

    let status = if research.status == ArtifactStatus::Healthy && notes.is_empty() {
        ArtifactStatus::Healthy
    } else {
        ArtifactStatus::Partial
    };
    if research.status != ArtifactStatus::Healthy {
        notes.push(format!("upstream research is {}", research.status));
    }

    let mut artifact = Artifact::new(ScriptBatch { scripts }, status).with_source_ref(research.id);
    if !notes.is_empty() {
        artifact = artifact.with_reason(notes.join("; "));
    }
    artifact
}

pub async fn run(ctx: &StageContext, config: &ScriptsConfig) -> Result<StageReport, StageError> {
    let research = ctx.store.upstream::<ResearchBriefs>().await;
    let competitors = ctx.store.upstream::<CompetitorAnalysis>().await;
    let artifact = generate(research, competitors, config);
    ctx.finish(&artifact).await
}
