//! Factory configuration
//!
//! Loaded once per invocation from `<root>/config.toml` and passed explicitly
//! into every stage. Every section has defaults, so a missing file (or a
//! missing section) still yields a working factory.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use artifacts::models::{master::RenderTarget, script::FormatTier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryConfig {
    #[serde(default)]
    pub trends: TrendsConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub competitors: CompetitorsConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub production: ProductionConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

impl FactoryConfig {
    /// Load configuration from file, or return defaults if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FactoryConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.check()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Cross-field sanity checks that serde cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.review.reject_threshold >= self.review.approve_threshold {
            return Err(ConfigError::Invalid(
                "review.reject_threshold must be below review.approve_threshold".to_string(),
            ));
        }
        if self.publish.caption_min_seconds <= 0.0
            || self.publish.caption_min_seconds > self.publish.caption_max_seconds
        {
            return Err(ConfigError::Invalid(
                "publish caption band must satisfy 0 < min <= max".to_string(),
            ));
        }
        for template in &self.scripts.templates {
            let total: u32 = template.sections.iter().map(|s| s.percent).sum();
            if template.sections.is_empty() || total != 100 {
                return Err(ConfigError::Invalid(format!(
                    "template '{}' section percentages sum to {}, expected 100",
                    template.id, total
                )));
            }
            if template.min_duration > template.max_duration {
                return Err(ConfigError::Invalid(format!(
                    "template '{}' has min_duration above max_duration",
                    template.id
                )));
            }
        }
        if !self
            .scripts
            .templates
            .iter()
            .any(|t| t.id == self.scripts.fallback_template)
        {
            return Err(ConfigError::Invalid(format!(
                "fallback template '{}' is not declared",
                self.scripts.fallback_template
            )));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn weights(items: &[(&str, f64)]) -> BTreeMap<String, f64> {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// ---------------------------------------------------------------------------
// trends
// ---------------------------------------------------------------------------

/// A JSON feed: a local file path or an `http(s)` URL returning
/// `[{title, link, summary}]` (or `{"items": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub location: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "tech".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendsConfig {
    pub sources: Vec<SourceConfig>,
    pub base_score: f64,
    pub keyword_weights: BTreeMap<String, f64>,
    pub category_weights: BTreeMap<String, f64>,
    pub top_n: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            base_score: 10.0,
            keyword_weights: weights(&[
                ("ai", 3.0),
                ("llm", 3.0),
                ("model", 2.0),
                ("agent", 2.0),
                ("open source", 2.0),
                ("rust", 2.0),
                ("breakthrough", 2.0),
                ("launch", 1.5),
                ("release", 1.5),
                ("gpu", 1.5),
                ("security", 1.5),
                ("benchmark", 1.0),
            ]),
            category_weights: weights(&[
                ("ai", 3.0),
                ("research", 2.5),
                ("dev", 2.0),
                ("tech", 1.5),
                ("business", 1.0),
            ]),
            top_n: 20,
            fetch_timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub top_n: usize,
    /// Follow-up question templates keyed by category; `default` applies to
    /// every category. `{topic}` is replaced with the trend title.
    pub followup_templates: BTreeMap<String, Vec<String>>,
    /// Words that mark an item as an announcement rather than research.
    pub announcement_markers: Vec<String>,
    pub research_markers: Vec<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let mut followup_templates = BTreeMap::new();
        followup_templates.insert(
            "ai".to_string(),
            strings(&[
                "What benchmarks back the claims in {topic}?",
                "Which models or datasets does {topic} depend on?",
                "How does {topic} change costs for developers?",
            ]),
        );
        followup_templates.insert(
            "research".to_string(),
            strings(&[
                "Has {topic} been peer reviewed or reproduced?",
                "What are the stated limitations of {topic}?",
            ]),
        );
        followup_templates.insert(
            "dev".to_string(),
            strings(&[
                "Is there a minimal code example for {topic}?",
                "What breaks when migrating to {topic}?",
            ]),
        );
        followup_templates.insert(
            "default".to_string(),
            strings(&[
                "Who is most affected by {topic}?",
                "What happens next for {topic}?",
                "What is the strongest counter-argument to {topic}?",
            ]),
        );
        Self {
            top_n: 10,
            followup_templates,
            announcement_markers: strings(&[
                "announces",
                "announced",
                "launches",
                "launched",
                "releases",
                "released",
                "unveils",
                "introduces",
            ]),
            research_markers: strings(&[
                "paper", "study", "research", "arxiv", "benchmark", "findings",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// competitors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub name: String,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub default_angle: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitorsConfig {
    /// The house strength set differentiation is diffed against.
    pub strengths: Vec<String>,
    /// Differentiation angle phrased for each house strength.
    pub strength_angles: BTreeMap<String, String>,
    pub fallback_angle: String,
    pub competitors: Vec<CompetitorProfile>,
}

impl Default for CompetitorsConfig {
    fn default() -> Self {
        let mut strength_angles = BTreeMap::new();
        strength_angles.insert(
            "technical_depth".to_string(),
            "Go one layer deeper: explain the mechanism, not just the headline".to_string(),
        );
        strength_angles.insert(
            "code_first".to_string(),
            "Show working code on screen within the first half".to_string(),
        );
        strength_angles.insert(
            "multi_modal".to_string(),
            "Pair every claim with a diagram or live visual".to_string(),
        );
        Self {
            strengths: strings(&["technical_depth", "code_first", "multi_modal"]),
            strength_angles,
            fallback_angle: "Lead with a concrete, testable takeaway viewers can try today"
                .to_string(),
            competitors: vec![
                CompetitorProfile {
                    name: "SpeedByte".to_string(),
                    categories: strings(&["tech", "dev"]),
                    keywords: strings(&["launch", "release", "framework", "javascript", "update"]),
                    strengths: strings(&["speed", "humor"]),
                    default_angle: "Hundred-second news recap".to_string(),
                },
                CompetitorProfile {
                    name: "PaperMinute".to_string(),
                    categories: strings(&["research", "ai"]),
                    keywords: strings(&["paper", "research", "model", "neural", "study"]),
                    strengths: strings(&["technical_depth", "visuals"]),
                    default_angle: "Visual walkthrough of the paper's results".to_string(),
                },
                CompetitorProfile {
                    name: "CodeCast".to_string(),
                    categories: strings(&["dev"]),
                    keywords: strings(&["rust", "python", "tutorial", "how to", "performance"]),
                    strengths: strings(&["code_first", "live_coding"]),
                    default_angle: "Live-coded demo of the feature".to_string(),
                },
                CompetitorProfile {
                    name: "AI Daily".to_string(),
                    categories: strings(&["ai", "business"]),
                    keywords: strings(&["ai", "llm", "agent", "openai", "funding"]),
                    strengths: strings(&["breadth", "speed"]),
                    default_angle: "Industry roundup with market context".to_string(),
                },
                CompetitorProfile {
                    name: "Explainer Lab".to_string(),
                    categories: strings(&["tech", "research"]),
                    keywords: strings(&["explained", "why", "how", "future"]),
                    strengths: strings(&["multi_modal", "storytelling"]),
                    default_angle: "Animated explainer for a general audience".to_string(),
                },
                CompetitorProfile {
                    name: "Hardware Weekly".to_string(),
                    categories: strings(&["tech"]),
                    keywords: strings(&["gpu", "chip", "benchmark", "hardware"]),
                    strengths: strings(&["benchmarks"]),
                    default_angle: "Benchmark charts and buying advice".to_string(),
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub name: String,
    /// Content type; its uppercase form becomes the bracketed section tag.
    pub purpose: String,
    /// Share of the target duration, in percent.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub id: String,
    pub format: FormatTier,
    pub min_duration: u32,
    pub max_duration: u32,
    /// Hook pattern; `{topic}`, `{source}` and `{category}` are substituted.
    pub hook_pattern: String,
    pub sections: Vec<SectionSpec>,
}

impl TemplateConfig {
    /// Midpoint of the declared duration range.
    pub fn target_duration(&self) -> u32 {
        (self.min_duration + self.max_duration) / 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRule {
    pub template_id: String,
    pub keywords: Vec<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Declaration order breaks score ties.
    pub templates: Vec<TemplateConfig>,
    pub rules: Vec<TemplateRule>,
    pub fallback_template: String,
    pub fallback_bonus: f64,
    /// Sources treated as academic; they favour `academic_template`.
    pub academic_sources: Vec<String>,
    pub academic_template: String,
    pub academic_weight: f64,
    pub cta_line: String,
}

fn section(name: &str, purpose: &str, percent: u32) -> SectionSpec {
    SectionSpec {
        name: name.to_string(),
        purpose: purpose.to_string(),
        percent,
    }
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        let templates = vec![
            TemplateConfig {
                id: "news_flash".to_string(),
                format: FormatTier::Short,
                min_duration: 30,
                max_duration: 60,
                hook_pattern: "Breaking: {topic}. Here is what it means in under a minute."
                    .to_string(),
                sections: vec![
                    section("hook", "hook", 15),
                    section("what_happened", "news", 35),
                    section("why_it_matters", "analysis", 35),
                    section("cta", "cta", 15),
                ],
            },
            TemplateConfig {
                id: "tutorial".to_string(),
                format: FormatTier::Standard,
                min_duration: 45,
                max_duration: 90,
                hook_pattern: "Want to try {topic}? Here is how, step by step.".to_string(),
                sections: vec![
                    section("hook", "hook", 10),
                    section("setup", "setup", 20),
                    section("steps", "steps", 45),
                    section("result", "demo", 15),
                    section("cta", "cta", 10),
                ],
            },
            TemplateConfig {
                id: "comparison".to_string(),
                format: FormatTier::Standard,
                min_duration: 45,
                max_duration: 90,
                hook_pattern: "{topic}: which one actually wins?".to_string(),
                sections: vec![
                    section("hook", "hook", 10),
                    section("contenders", "context", 20),
                    section("head_to_head", "comparison", 45),
                    section("verdict", "verdict", 15),
                    section("cta", "cta", 10),
                ],
            },
            TemplateConfig {
                id: "deep_dive".to_string(),
                format: FormatTier::Long,
                min_duration: 60,
                max_duration: 120,
                hook_pattern: "Everyone is talking about {topic}. Few explain how it works."
                    .to_string(),
                sections: vec![
                    section("hook", "hook", 10),
                    section("background", "context", 20),
                    section("mechanism", "explanation", 35),
                    section("implications", "analysis", 25),
                    section("cta", "cta", 10),
                ],
            },
            TemplateConfig {
                id: "explainer".to_string(),
                format: FormatTier::Short,
                min_duration: 30,
                max_duration: 60,
                hook_pattern: "{topic}, explained simply. Here is why {category} watchers care."
                    .to_string(),
                sections: vec![
                    section("hook", "hook", 15),
                    section("explanation", "explanation", 55),
                    section("takeaway", "takeaway", 15),
                    section("cta", "cta", 15),
                ],
            },
        ];
        Self {
            templates,
            rules: vec![
                TemplateRule {
                    template_id: "news_flash".to_string(),
                    keywords: strings(&[
                        "breaking",
                        "announces",
                        "announced",
                        "launches",
                        "launched",
                        "just released",
                    ]),
                    weight: 3.0,
                },
                TemplateRule {
                    template_id: "tutorial".to_string(),
                    keywords: strings(&["how to", "guide", "getting started", "step by step"]),
                    weight: 3.0,
                },
                TemplateRule {
                    template_id: "comparison".to_string(),
                    keywords: strings(&[" vs ", " vs. ", "versus", "compared"]),
                    weight: 3.0,
                },
            ],
            fallback_template: "explainer".to_string(),
            fallback_bonus: 0.5,
            academic_sources: strings(&["arxiv", "nature", "science", "acm", "ieee", "openreview"]),
            academic_template: "deep_dive".to_string(),
            academic_weight: 3.0,
            cta_line: "Follow SKYBEAM for more {category} breakdowns like this one.".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub approve_threshold: u8,
    pub reject_threshold: u8,
    /// Content shorter than this after the section tag is a placeholder.
    pub placeholder_min_chars: usize,
    pub power_words: Vec<String>,
    pub engagement_patterns: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            approve_threshold: 7,
            reject_threshold: 4,
            placeholder_min_chars: 20,
            power_words: strings(&[
                "breaking",
                "secret",
                "finally",
                "actually",
                "everyone",
                "nobody",
                "simple",
                "fast",
                "wins",
                "new",
            ]),
            engagement_patterns: strings(&["?", "here is", "you", "why", "how", "what"]),
        }
    }
}

// ---------------------------------------------------------------------------
// assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub disallowed_words: Vec<String>,
    pub trademark_terms: Vec<String>,
    pub prompt_min_chars: usize,
    pub prompt_max_chars: usize,
    /// `review_required` once warnings exceed this count.
    pub max_warnings: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            disallowed_words: strings(&["gore", "nsfw", "nude", "explicit", "weapon", "blood"]),
            trademark_terms: strings(&[
                "Apple",
                "Google",
                "Microsoft",
                "OpenAI",
                "Nvidia",
                "Meta",
                "Tesla",
                "Disney",
                "Netflix",
                "Amazon",
            ]),
            prompt_min_chars: 20,
            prompt_max_chars: 400,
            max_warnings: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// production
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub max_duration_seconds: u32,
    pub encode_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Slack allowed on the duration ceiling for container rounding.
    pub duration_tolerance_seconds: f64,
}

impl ProductionConfig {
    pub fn target(&self) -> RenderTarget {
        RenderTarget {
            width: self.width,
            height: self.height,
            fps: self.fps,
            max_duration_seconds: self.max_duration_seconds,
        }
    }
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            width: 1080,
            height: 1920,
            fps: 30,
            max_duration_seconds: 60,
            encode_timeout_secs: 300,
            probe_timeout_secs: 30,
            duration_tolerance_seconds: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub platforms: Vec<String>,
    pub caption_min_seconds: f64,
    pub caption_max_seconds: f64,
    pub max_retries: u32,
    pub title_max_chars: usize,
    pub base_hashtags: Vec<String>,
    /// Used whenever narration text is unavailable.
    pub fallback_captions: Vec<String>,
    pub upload_timeout_secs: u64,
    /// Uploaded videos start with this privacy status.
    pub privacy_status: String,
    /// Defaults to `<root>/credentials`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_dir: Option<PathBuf>,
}

impl PublishConfig {
    pub fn credentials_dir(&self, root: &Path) -> PathBuf {
        match &self.credentials_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => utils::assets::credentials_dir(root),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            platforms: strings(&["youtube"]),
            caption_min_seconds: 1.5,
            caption_max_seconds: 6.0,
            max_retries: 3,
            title_max_chars: 100,
            base_hashtags: strings(&["#Shorts", "#SKYBEAM"]),
            fallback_captions: strings(&[
                "New from SKYBEAM.",
                "The story in sixty seconds.",
                "Follow for more.",
            ]),
            upload_timeout_secs: 600,
            privacy_status: "private".to_string(),
            credentials_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = FactoryConfig::default();
        config.check().unwrap();
        assert_eq!(config.trends.top_n, 20);
        assert_eq!(config.review.approve_threshold, 7);
        assert_eq!(config.review.reject_threshold, 4);
        assert_eq!(config.publish.max_retries, 3);
        assert_eq!(config.production.target().height, 1920);
    }

    #[test]
    fn credentials_dir_resolves_against_root() {
        let root = Path::new("/srv/skybeam");
        let mut publish = PublishConfig::default();
        assert_eq!(publish.credentials_dir(root), root.join("credentials"));
        publish.credentials_dir = Some(PathBuf::from("secrets"));
        assert_eq!(publish.credentials_dir(root), root.join("secrets"));
        publish.credentials_dir = Some(PathBuf::from("/etc/skybeam"));
        assert_eq!(publish.credentials_dir(root), PathBuf::from("/etc/skybeam"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FactoryConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.assets.max_warnings, 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[trends]
top_n = 5

[[trends.sources]]
name = "local"
location = "/tmp/feed.json"

[production]
max_duration_seconds = 45
"#,
        )
        .unwrap();

        let config = FactoryConfig::load(&path).unwrap();
        assert_eq!(config.trends.top_n, 5);
        assert_eq!(config.trends.base_score, 10.0);
        assert_eq!(config.trends.sources[0].category, "tech");
        assert_eq!(config.production.max_duration_seconds, 45);
        assert_eq!(config.production.width, 1080);
        assert_eq!(config.scripts.templates.len(), 5);
    }

    #[test]
    fn rendered_defaults_parse_back() {
        let text = FactoryConfig::default().to_toml().unwrap();
        let parsed: FactoryConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.scripts.fallback_template, "explainer");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut config = FactoryConfig::default();
        config.review.reject_threshold = 8;
        assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
    }
}
