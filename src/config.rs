//! Tunable settings loaded from a YAML file.
//!
//! Secrets, paths and service endpoints come from the command line or the
//! environment (see [`crate::cli`]). Everything else lives here, and every
//! field has a default so the file itself is optional.
//!
//! ```yaml
//! text:
//!   model: gpt-4
//! topic:
//!   max_attempts: 5
//!   similarity_threshold: 0.8
//! transcode:
//!   max_kb: 976
//! ```

use crate::error::ConfigError;
use crate::transcode::TranscodeOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub text: TextConfig,
    pub topic: TopicConfig,
    pub content: ContentConfig,
    pub labels: LabelConfig,
    pub image: ImageConfig,
    pub transcode: TranscodeOptions,
    pub promote: PromoteConfig,
}

/// Text-generation model and per-request knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub model: String,
    pub topic_max_tokens: u32,
    pub topic_temperature: f32,
    pub topic_timeout_secs: u64,
    pub content_max_tokens: u32,
    pub content_temperature: f32,
    pub content_timeout_secs: u64,
    pub label_temperature: f32,
    pub label_timeout_secs: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".into(),
            topic_max_tokens: 20,
            topic_temperature: 0.7,
            topic_timeout_secs: 15,
            content_max_tokens: 2000,
            content_temperature: 0.4,
            content_timeout_secs: 30,
            label_temperature: 0.6,
            label_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Subject areas named in the topic prompt.
    pub subjects: Vec<String>,
    pub max_attempts: usize,
    pub backoff_secs: u64,
    pub similarity_threshold: f64,
    pub history_limit: usize,
    /// How many recent blog titles to compare against.
    pub recent_titles: usize,
    pub fallback_topic: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            subjects: [
                "AI",
                "cybersecurity",
                "IT leadership",
                "servant leadership",
                "mentoring",
                "collaboration",
            ]
            .map(String::from)
            .to_vec(),
            max_attempts: 5,
            backoff_secs: 2,
            similarity_threshold: crate::dedup::DEFAULT_THRESHOLD,
            history_limit: crate::history::DEFAULT_CAPACITY,
            recent_titles: 30,
            fallback_topic: "Cybersecurity and IT Leadership Trends in 2025".into(),
        }
    }
}

/// Where the published title comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSource {
    /// The accepted topic is the title; any `<h1>` in the body is dropped.
    #[default]
    Topic,
    /// The model writes `<title>…</title>` at the top of the body.
    Embedded,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub title_source: TitleSource,
    /// Phrases removed from the generated body.
    pub avoid_phrases: Vec<String>,
    /// HTML appended after the body.
    pub signature_html: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            title_source: TitleSource::Topic,
            avoid_phrases: [
                "crucial",
                "vital",
                "harnessing",
                "robust",
                "synergy",
                "innovative",
                "optimize",
                "leverage",
                "holistic",
                "scalable",
                "empower",
                "framework",
                "pivotal",
                "comprehensive",
                "facilitate",
                "ubiquitous",
                "delve",
                "compelling",
                "transformative",
                "streamline",
                "cutting-edge",
                "game-changing",
                "orchestrating operational excellence",
                "dynamic realm of",
                "unwavering commitment",
                "navigating complexities",
                "is key",
                "fostering a culture of",
                "imperative of harmonizing",
                "foster",
                "the trenches",
                "in the thick of it",
                "hard-earned wisdom",
                "in conclusion",
                "to sum up",
                "as a finance professional",
                "from my years in finance",
                "not just",
                "more than just",
                "more than just about",
                "essential",
                "firstly",
                "from the trenches",
                "for good reason",
                "isn't just about",
                "also about",
                "As an IT professional",
                "As a CIO",
                "As a technology leader",
                "From my experience in IT",
                "As someone in the tech industry",
                "From my years in leadership",
                "As someone who has worked in IT",
                "From the perspective of a CIO",
                "As an experienced IT leader",
            ]
            .map(String::from)
            .to_vec(),
            signature_html: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub pool: Vec<String>,
    pub fixed_fallback: Vec<String>,
    pub ai_fallback: Vec<String>,
    /// Characters of body text shown to the model when picking labels.
    pub excerpt_chars: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            pool: [
                "AI",
                "Cybersecurity",
                "IT Leadership",
                "Data Privacy",
                "Cloud Security",
                "Machine Learning",
                "Threat Intelligence",
                "Zero Trust",
                "Network Security",
                "Blockchain",
                "DevSecOps",
                "Risk Management",
            ]
            .map(String::from)
            .to_vec(),
            fixed_fallback: vec!["AI".into(), "Cybersecurity".into()],
            ai_fallback: vec!["Tech Trends".into(), "IT Strategy".into()],
            excerpt_chars: 1000,
        }
    }
}

/// A fallback image that `seed-fallbacks` generates ahead of time.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackSeed {
    pub category: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub model: String,
    pub size: String,
    /// `{topic}` is replaced with the accepted topic.
    pub prompt_template: String,
    pub timeout_secs: u64,
    /// Category used to pick a fallback when generation fails.
    pub fallback_category: String,
    /// Category -> file name inside the fallback directory.
    pub fallback_images: BTreeMap<String, String>,
    /// Used when no category matches and when a chosen file is missing.
    pub default_fallback: String,
    pub seed_size: String,
    pub seeds: Vec<FallbackSeed>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let fallback_images = [
            ("ai", "ai_fallback_image.png"),
            ("cybersecurity", "cybersecurity_fallback_image.png"),
            ("it_leadership", "it_leadership_fallback_image.png"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            model: "dall-e-3".into(),
            size: "1024x1024".into(),
            prompt_template: "A futuristic, high-tech concept art related to {topic}. Vibrant colors, engaging and dynamic.".into(),
            timeout_secs: 120,
            fallback_category: "ai".into(),
            fallback_images,
            default_fallback: "default_fallback_image.png".into(),
            seed_size: "1792x1024".into(),
            seeds: vec![
                FallbackSeed {
                    category: "ai".into(),
                    prompt: "A futuristic AI concept, glowing neural networks and a digital human face in a cyberpunk city.".into(),
                },
                FallbackSeed {
                    category: "cybersecurity".into(),
                    prompt: "A cyber shield protecting data streams, futuristic digital security concept with a glowing firewall.".into(),
                },
                FallbackSeed {
                    category: "it_leadership".into(),
                    prompt: "A confident and visionary IT leader in a modern boardroom, guiding a team in a collaborative discussion. The scene reflects servant leadership, innovation, and teamwork. The leader is warm and approachable. Do not include text in the image.".into(),
                },
            ],
        }
    }
}

/// Text limits for the social posts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromoteConfig {
    pub bluesky_enabled: bool,
    pub bluesky_max_chars: usize,
    pub bluesky_hashtags: usize,
    pub card_description: String,
    pub twitter_enabled: bool,
    pub twitter_max_chars: usize,
    pub twitter_hashtags: usize,
    /// Also post a long-form teaser of the article on X.
    pub teaser_enabled: bool,
    pub teaser_max_chars: usize,
    pub teaser_hashtags: usize,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            bluesky_enabled: true,
            bluesky_max_chars: 300,
            bluesky_hashtags: 4,
            card_description: "New blog post on AI, cybersecurity, and IT leadership!".into(),
            twitter_enabled: true,
            twitter_max_chars: 280,
            twitter_hashtags: 3,
            teaser_enabled: false,
            teaser_max_chars: 5000,
            teaser_hashtags: 4,
        }
    }
}

impl AppConfig {
    /// Load `path`, or fall back to defaults when it does not exist.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        info!("Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.topic.max_attempts == 0 {
            return invalid("topic.max_attempts", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.topic.similarity_threshold) {
            return invalid("topic.similarity_threshold", "must be within [0, 1]");
        }
        if self.topic.history_limit == 0 {
            return invalid("topic.history_limit", "must be at least 1");
        }
        if self.labels.pool.len() < 2 {
            return invalid("labels.pool", "needs at least two labels");
        }
        if self.labels.fixed_fallback.len() != 2 {
            return invalid("labels.fixed_fallback", "needs exactly two labels");
        }
        if self.labels.ai_fallback.len() != 2 {
            return invalid("labels.ai_fallback", "needs exactly two labels");
        }
        if !(1..=100).contains(&self.transcode.start_quality) {
            return invalid("transcode.start_quality", "must be within 1..=100");
        }
        if self.transcode.quality_step == 0 {
            return invalid("transcode.quality_step", "must be positive");
        }
        if self.transcode.quality_floor == 0 || self.transcode.quality_floor > 100 {
            return invalid("transcode.quality_floor", "must be within 1..=100");
        }
        if self.transcode.max_width == 0 || self.transcode.max_height == 0 {
            return invalid("transcode", "bounding box must be non-empty");
        }
        if self.promote.bluesky_max_chars < 3 {
            return invalid("promote.bluesky_max_chars", "must be at least 3");
        }
        if self.promote.twitter_max_chars < 3 {
            return invalid("promote.twitter_max_chars", "must be at least 3");
        }
        Ok(())
    }
}
