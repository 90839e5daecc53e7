//! Template selection.
//!
//! Every template is scored against the brief with keyword rules; the
//! designated fallback gets a small constant bonus. Highest score wins and
//! ties go to the template declared first.

use artifacts::models::research::ResearchBrief;

use crate::services::config::{ScriptsConfig, TemplateConfig};

fn rule_text(brief: &ResearchBrief) -> String {
    format!(" {} {} ", brief.title, brief.claims.join(" ")).to_lowercase()
}

fn is_academic(brief: &ResearchBrief, config: &ScriptsConfig) -> bool {
    let source = brief.source.to_lowercase();
    let link = brief.link.to_lowercase();
    config
        .academic_sources
        .iter()
        .map(|s| s.to_lowercase())
        .any(|s| source.contains(&s) || link.contains(&s))
}

/// `(template_id, score)` in declaration order.
pub fn score_templates(brief: &ResearchBrief, config: &ScriptsConfig) -> Vec<(String, f64)> {
    let text = rule_text(brief);
    let academic = is_academic(brief, config);

    config
        .templates
        .iter()
        .map(|template| {
            let mut score: f64 = config
                .rules
                .iter()
                .filter(|rule| rule.template_id == template.id)
                .filter(|rule| {
                    rule.keywords
                        .iter()
                        .any(|k| text.contains(&k.to_lowercase()))
                })
                .map(|rule| rule.weight)
                .sum();
            if academic && template.id == config.academic_template {
                score += config.academic_weight;
            }
            if template.id == config.fallback_template {
                score += config.fallback_bonus;
            }
            (template.id.clone(), score)
        })
        .collect()
}

pub fn select_template<'a>(
    brief: &ResearchBrief,
    config: &'a ScriptsConfig,
) -> Option<&'a TemplateConfig> {
    let scores = score_templates(brief, config);
    let mut best: Option<(usize, f64)> = None;
    for (idx, (_, score)) in scores.iter().enumerate() {
        // Strictly greater: earlier declarations win ties
        if best.is_none_or(|(_, top)| *score > top) {
            best = Some((idx, *score));
        }
    }
    best.map(|(idx, _)| &config.templates[idx])
}
