use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use super::{Categories, Category};

/// Name of the configuration file in the site root.
pub const CONFIG_FILE: &str = "scribe.toml";

/// Directory under the site root holding the topic queue and generation log.
pub const DATA_DIR: &str = ".scribe";

/// Configuration for the article store, validation gate and generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Where articles live and how they are validated.
    pub content: ContentConfig,

    /// Text-generation endpoint, model chain and pacing.
    pub generation: GenerationConfig,

    /// Caller-side call budget and retry caps.
    pub quota: QuotaConfig,

    /// Editorial categories.
    ///
    /// If this is empty, the built-in categories are used.
    categories: Vec<Category>,

    /// Site information used in feeds and request headers.
    pub site: SiteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content: ContentConfig::default(),
            generation: GenerationConfig::default(),
            quota: QuotaConfig::default(),
            categories: Vec::new(),
            site: SiteConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Loads `scribe.toml` from the site root, falling back to defaults.
    #[must_use]
    pub fn load_or_default(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Failed to load config from {}: {e}", path.display());
            Self::default()
        })
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// The configured categories, or the built-in set if none are configured.
    #[must_use]
    pub fn categories(&self) -> Categories {
        Categories::new(self.categories.clone()).unwrap_or_default()
    }

    /// Replaces the configured categories.
    pub fn set_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
    }

    /// The article directory for a site rooted at `root`.
    #[must_use]
    pub fn content_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.content.dir)
    }

    /// The bookkeeping directory for a site rooted at `root`.
    #[must_use]
    pub fn data_dir(root: &Path) -> PathBuf {
        root.join(DATA_DIR)
    }
}

/// Errors reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    /// The file is not valid configuration TOML.
    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
}

/// Article storage and validation thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Article directory, relative to the site root.
    pub dir: PathBuf,
    /// File extension of article files, without the dot.
    pub extension: String,
    /// Hard word-count floor; shorter articles are rejected.
    pub min_words: usize,
    /// Soft word-count target; shorter articles are saved with a warning.
    pub target_words: usize,
    /// Minimum title length in characters.
    pub min_title_len: usize,
    /// Minimum slug length in characters.
    pub min_slug_len: usize,
    /// Description length below which a warning is raised.
    pub min_description_len: usize,
    /// File size in bytes below which a written file is flagged.
    pub min_file_bytes: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("content/articles"),
            extension: "mdx".to_string(),
            min_words: 500,
            target_words: 2500,
            min_title_len: 10,
            min_slug_len: 5,
            min_description_len: 50,
            min_file_bytes: 1000,
        }
    }
}

/// Text-generation endpoint, model fallback chain and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of the chat-completion API.
    pub base_url: String,
    /// Models in fallback order.
    ///
    /// If this is empty, the built-in chain is used.
    models: Vec<String>,
    /// Default completion token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Articles generated per run.
    pub articles_per_run: usize,
    /// Whole-article attempts before the article is recorded as failed.
    pub attempts_per_article: usize,
    /// Pause after every successful call, in milliseconds.
    pub call_delay_ms: u64,
    /// Pause between retries on the same model, in milliseconds.
    pub retry_delay_ms: u64,
    /// Pause between whole-article attempts, in milliseconds.
    pub attempt_delay_ms: u64,
    /// Pause between articles in a batch, in milliseconds.
    pub article_delay_ms: u64,
    /// Wait when every model in the chain is rate limited, in seconds.
    pub rate_limit_wait_secs: u64,
    /// Value of the `X-Title` request header.
    pub app_title: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            models: Vec::new(),
            max_tokens: 8000,
            temperature: 0.75,
            articles_per_run: 1,
            attempts_per_article: 3,
            call_delay_ms: 2000,
            retry_delay_ms: 3000,
            attempt_delay_ms: 5000,
            article_delay_ms: 10_000,
            rate_limit_wait_secs: 90,
            app_title: "Blog Article Generator".to_string(),
        }
    }
}

impl GenerationConfig {
    /// The model fallback chain in configured order.
    #[must_use]
    pub fn models(&self) -> NonEmpty<String> {
        NonEmpty::from_vec(self.models.clone()).unwrap_or_else(default_models)
    }

    /// Replaces the model chain.
    pub fn set_models(&mut self, models: Vec<String>) {
        self.models = models;
    }

    /// Delays derived from the millisecond settings.
    #[must_use]
    pub const fn pacing(&self) -> Pacing {
        Pacing {
            call: Duration::from_millis(self.call_delay_ms),
            retry: Duration::from_millis(self.retry_delay_ms),
            attempt: Duration::from_millis(self.attempt_delay_ms),
            article: Duration::from_millis(self.article_delay_ms),
            rate_limit: Duration::from_secs(self.rate_limit_wait_secs),
        }
    }
}

/// The explicit suspension points of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    /// After every successful call.
    pub call: Duration,
    /// Between retries on the same model.
    pub retry: Duration,
    /// Between whole-article attempts.
    pub attempt: Duration,
    /// Between articles in a batch.
    pub article: Duration,
    /// When the whole chain is rate limited.
    pub rate_limit: Duration,
}

impl Pacing {
    /// No delays at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            call: Duration::ZERO,
            retry: Duration::ZERO,
            attempt: Duration::ZERO,
            article: Duration::ZERO,
            rate_limit: Duration::ZERO,
        }
    }
}

fn default_models() -> NonEmpty<String> {
    NonEmpty::from((
        "google/gemini-2.0-flash-exp:free".to_string(),
        [
            "meta-llama/llama-3.3-70b-instruct:free",
            "google/gemma-3-27b-it:free",
            "mistralai/mistral-small-3.1-24b-instruct:free",
            "deepseek/deepseek-r1-0528:free",
            "openai/gpt-oss-120b:free",
            "qwen/qwen3-coder:free",
            "z-ai/glm-4.5-air:free",
            "tngtech/deepseek-r1t-chimera:free",
            "google/gemma-3-12b-it:free",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    ))
}

/// Caller-side call budget and retry caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Hard daily call limit imposed by the provider.
    pub daily_limit: u32,
    /// Calls held back below the hard limit.
    pub safety_margin: u32,
    /// Usage above which every call logs a warning.
    pub warn_threshold: u32,
    /// Attempts per model before moving down the chain.
    pub retries_per_model: u32,
    /// Passes over the whole chain when every model is rate limited.
    pub global_retries: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 50,
            safety_margin: 5,
            warn_threshold: 40,
            retries_per_model: 1,
            global_retries: 1,
        }
    }
}

/// Site information for feeds and request headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Canonical site URL without a trailing slash.
    pub url: String,
    /// Site title.
    pub title: String,
    /// Site description.
    pub description: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Content language.
    pub language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://example.com".to_string(),
            title: "Articles".to_string(),
            description: "Articles on technology, finance and AI.".to_string(),
            author: "Site Author".to_string(),
            email: "author@example.com".to_string(),
            language: "en-US".to_string(),
        }
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        content: ContentConfig,

        #[serde(default)]
        generation: GenerationConfig,

        #[serde(default)]
        quota: QuotaConfig,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        categories: Vec<Category>,

        #[serde(default)]
        site: SiteConfig,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                content,
                generation,
                quota,
                categories,
                site,
            } => Self {
                content,
                generation,
                quota,
                categories,
                site,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            content: config.content,
            generation: config.generation,
            quota: config.quota,
            categories: config.categories,
            site: config.site,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            r#"_version = "1"

[content]
dir = "posts"
min_words = 800

[generation]
models = ["a/one:free", "b/two:free"]
call_delay_ms = 0

[quota]
daily_limit = 20

[[categories]]
name = "Rust"
emoji = "🦀"
weight = 3
"#
            .as_bytes(),
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.content.dir, PathBuf::from("posts"));
        assert_eq!(config.content.min_words, 800);
        assert_eq!(config.content.extension, "mdx");
        assert_eq!(config.generation.models().len(), 2);
        assert_eq!(config.generation.models().first(), "a/one:free");
        assert_eq!(config.generation.pacing().call, Duration::ZERO);
        assert_eq!(config.quota.daily_limit, 20);
        assert_eq!(config.quota.safety_margin, 5);
        assert_eq!(config.categories().first().name, "Rust");
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Read(_)));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\n[content]\nmin_words = \"many\"\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.to_string().starts_with("failed to parse config file:"));
    }

    #[test]
    fn version_only_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.generation.set_models(vec!["x/y:free".to_string()]);
        config.set_categories(vec![Category::new("Rust", "🦀", 1)]);

        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn empty_lists_fall_back_to_builtins() {
        let config = Config::default();
        assert_eq!(config.generation.models().len(), 10);
        assert_eq!(config.categories(), Categories::default());
    }
}
