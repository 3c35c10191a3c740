//! Configuration module for loading TOML config files.
//!
//! Every section is optional in the file; missing values fall back to the
//! defaults below. API credentials are usually supplied through the
//! environment and overlaid with [`Config::with_env`].

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::PolidebateError;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub completion: CompletionConfig,
    pub categorizer: CategorizerConfig,
    pub news: NewsConfig,
    pub debate: DebateConfig,
    pub voices: VoicesConfig,
    pub trending: TrendingConfig,
}

/// OpenAI-compatible endpoint used for categorization calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Same endpoint and credentials, different model and timeout.
    pub fn with_model(&self, model: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            model: model.into(),
            timeout_secs,
            ..self.clone()
        }
    }
}

/// Batch sizes, temperatures and thresholds for the categorizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    /// Summaries sent to the category generator.
    pub generation_sample: usize,
    pub assign_batch_size: usize,
    pub validate_batch_size: usize,
    pub recollect_batch_size: usize,
    pub prefilter_batch_size: usize,
    /// Categories with fewer articles are dropped before validation.
    /// Values below 2 are raised to 2, see [`CategorizerConfig::size_threshold`].
    pub min_category_size: usize,
    pub generation_temperature: f32,
    pub assignment_temperature: f32,
    /// Run the foreign-local-politics pre-filter before categorizing.
    pub prefilter: bool,
}

/// Smallest category the pipeline keeps, whatever the configured value.
pub const MIN_CATEGORY_SIZE_FLOOR: usize = 2;

impl CategorizerConfig {
    /// Effective size threshold: `min_category_size`, never below 2.
    pub fn size_threshold(&self) -> usize {
        self.min_category_size.max(MIN_CATEGORY_SIZE_FLOOR)
    }
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            generation_sample: 20,
            assign_batch_size: 10,
            validate_batch_size: 5,
            recollect_batch_size: 5,
            prefilter_batch_size: 10,
            min_category_size: 2,
            generation_temperature: 0.5,
            assignment_temperature: 0.3,
            prefilter: false,
        }
    }
}

/// News retrieval endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub api_base: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub days_back: i64,
    pub max_articles: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://newsapi.org/v2".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
            days_back: 7,
            max_articles: 50,
        }
    }
}

/// Models used for the debate analysis and the script.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebateConfig {
    pub analysis_model: String,
    pub analysis_temperature: f32,
    pub analysis_timeout_secs: u64,
    pub script_model: String,
    pub script_temperature: f32,
    pub script_timeout_secs: u64,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            analysis_model: "perplexity/sonar-pro-search".to_string(),
            analysis_temperature: 0.0,
            analysis_timeout_secs: 60,
            script_model: "openai/gpt-4o".to_string(),
            script_temperature: 0.7,
            script_timeout_secs: 120,
        }
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub carnegie_voice: String,
    pub mellon_voice: String,
    /// Playback rate applied after synthesis (1.0 = unchanged).
    pub speed: f32,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            carnegie_voice: "am_michael".to_string(),
            mellon_voice: "bm_george".to_string(),
            speed: 1.0,
        }
    }
}

/// Parameters for the trending-topics path.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub days_back: i64,
    pub max_articles: usize,
    pub summaries: usize,
    pub topic_count: usize,
    pub fallback_topics: Vec<String>,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            days_back: 3,
            max_articles: 20,
            summaries: 10,
            topic_count: 5,
            fallback_topics: [
                "Government funding",
                "Election updates",
                "Foreign policy",
                "Healthcare reform",
                "Climate policy",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolidebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PolidebateError::Config(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Load configuration from string content.
    pub fn parse(content: &str) -> Result<Self, PolidebateError> {
        toml::from_str(content)
            .map_err(|e| PolidebateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay credentials and endpoints from environment variables.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENROUTER_API_KEY") {
            self.completion.api_key = key;
        }
        if let Some(base) = non_empty("OPENROUTER_BASE_URL") {
            self.completion.api_base = base;
        }
        if let Some(key) = non_empty("NEWS_API_KEY") {
            self.news.api_key = key;
        }
        if let Some(voice) = non_empty("CARNEGIE_VOICE") {
            self.voices.carnegie_voice = voice;
        }
        if let Some(voice) = non_empty("MELLON_VOICE") {
            self.voices.mellon_voice = voice;
        }
        self
    }

    /// Completion settings for the debate analysis call.
    pub fn analysis_completion(&self) -> CompletionConfig {
        self.completion
            .with_model(&self.debate.analysis_model, self.debate.analysis_timeout_secs)
    }

    /// Completion settings for the script call.
    pub fn script_completion(&self) -> CompletionConfig {
        self.completion
            .with_model(&self.debate.script_model, self.debate.script_timeout_secs)
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}
