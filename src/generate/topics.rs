//! The topic queue and the generation log.
//!
//! Both live as pretty-printed JSON under the data directory. The queue is
//! read once, mutated in memory and written back with [`TopicQueue::save`];
//! the log is append-only.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::Slug;

/// File name of the topic queue inside the data directory.
pub const QUEUE_FILE: &str = "topics.json";

/// File name of the generation log inside the data directory.
pub const LOG_FILE: &str = "generated-log.json";

/// Completed topics kept by [`TopicQueue::cleanup`].
pub const KEEP_COMPLETED: usize = 100;

/// What a searcher wants from a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchIntent {
    /// Wants to learn something.
    #[default]
    Informational,
    /// Wants to buy or do something.
    Transactional,
    /// Wants a specific site.
    Navigational,
    /// Is comparing options before buying.
    Commercial,
}

/// How hard a keyword is to rank for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Little competition.
    Low,
    /// Moderate competition.
    #[default]
    Medium,
    /// Heavy competition.
    High,
}

macro_rules! lowercase_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &[Self] = &[$(Self::$variant),+];

            /// The lowercase name used on disk and on the command line.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        let names: Vec<_> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        format!("expected one of: {}", names.join(", "))
                    })
            }
        }
    };
}

lowercase_enum!(SearchIntent {
    Informational => "informational",
    Transactional => "transactional",
    Navigational => "navigational",
    Commercial => "commercial",
});

lowercase_enum!(Difficulty {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Where a topic is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    /// Waiting to be written.
    Pending,
    /// Being written right now.
    Generating,
    /// Written and stored.
    Completed,
    /// Every attempt failed.
    Failed,
}

/// A proposed topic, as entered by hand or returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicIdea {
    /// Working title.
    pub title: String,
    /// Primary search keyword.
    pub target_keyword: String,
    /// Search intent.
    pub search_intent: SearchIntent,
    /// Ranking difficulty.
    pub difficulty: Difficulty,
    /// Category name.
    pub category: String,
}

/// A queued topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Stable identifier.
    pub id: Uuid,
    /// Working title.
    pub title: String,
    /// Primary search keyword.
    pub target_keyword: String,
    /// Search intent.
    #[serde(default)]
    pub search_intent: SearchIntent,
    /// Ranking difficulty.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Category name.
    pub category: String,
    /// Lifecycle status.
    pub status: TopicStatus,
    /// When the topic was queued.
    pub created_at: DateTime<Utc>,
    /// When the article was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Slug of the stored article.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_slug: Option<String>,
}

impl Topic {
    fn new(idea: TopicIdea, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: idea.title,
            target_keyword: idea.target_keyword,
            search_intent: idea.search_intent,
            difficulty: idea.difficulty,
            category: idea.category,
            status: TopicStatus::Pending,
            created_at: now,
            completed_at: None,
            article_slug: None,
        }
    }

    /// The topic as an idea, for prompting.
    #[must_use]
    pub fn idea(&self) -> TopicIdea {
        TopicIdea {
            title: self.title.clone(),
            target_keyword: self.target_keyword.clone(),
            search_intent: self.search_intent,
            difficulty: self.difficulty,
            category: self.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueFile {
    topics: Vec<Topic>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    total_generated: u64,
}

impl Default for QueueFile {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            last_updated: Utc::now(),
            total_generated: 0,
        }
    }
}

/// The queue of topics waiting to be written.
#[derive(Debug, Clone)]
pub struct TopicQueue {
    path: PathBuf,
    file: QueueFile,
}

impl TopicQueue {
    /// Opens the queue in `data_dir`. A missing file is an empty queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(data_dir: &Path) -> Result<Self, QueueError> {
        let path = data_dir.join(QUEUE_FILE);
        let file = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, file })
    }

    /// Writes the queue back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> Result<(), QueueError> {
        self.file.last_updated = Utc::now();
        write_json(&self.path, &self.file)
    }

    /// Every topic, in insertion order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.file.topics
    }

    /// Number of articles generated from the queue so far.
    #[must_use]
    pub const fn total_generated(&self) -> u64 {
        self.file.total_generated
    }

    /// Queues a new pending topic.
    pub fn add(&mut self, idea: TopicIdea) -> &Topic {
        let index = self.file.topics.len();
        self.file.topics.push(Topic::new(idea, Utc::now()));
        &self.file.topics[index]
    }

    /// The first `count` pending topics, oldest first.
    pub fn pending(&self, count: usize) -> impl Iterator<Item = &Topic> {
        self.file
            .topics
            .iter()
            .filter(|t| t.status == TopicStatus::Pending)
            .take(count)
    }

    /// Updates a topic's status; returns `false` if the id is unknown.
    ///
    /// Completing a topic stamps it, records the article slug and bumps the
    /// generated count.
    pub fn set_status(&mut self, id: Uuid, status: TopicStatus, slug: Option<&Slug>) -> bool {
        let Some(topic) = self.file.topics.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        topic.status = status;
        if status == TopicStatus::Completed {
            topic.completed_at = Some(Utc::now());
            topic.article_slug = slug.map(ToString::to_string);
            self.file.total_generated += 1;
        }
        true
    }

    /// Queues the starter topics if the queue has none at all.
    ///
    /// Returns how many topics were added.
    pub fn seed(&mut self) -> usize {
        if !self.file.topics.is_empty() {
            return 0;
        }
        let ideas = starter_topics();
        let count = ideas.len();
        for idea in ideas {
            self.add(idea);
        }
        count
    }

    /// Drops the oldest completed topics beyond [`KEEP_COMPLETED`].
    ///
    /// Returns how many topics were removed.
    pub fn cleanup(&mut self) -> usize {
        let completed = self
            .file
            .topics
            .iter()
            .filter(|t| t.status == TopicStatus::Completed)
            .count();
        let mut excess = completed.saturating_sub(KEEP_COMPLETED);
        let removed = excess;

        self.file.topics.retain(|t| {
            if excess > 0 && t.status == TopicStatus::Completed {
                excess -= 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

fn starter_topics() -> Vec<TopicIdea> {
    let idea = |title: &str, keyword: &str, intent, difficulty, category: &str| TopicIdea {
        title: title.to_string(),
        target_keyword: keyword.to_string(),
        search_intent: intent,
        difficulty,
        category: category.to_string(),
    };
    use Difficulty::{High, Low, Medium};
    use SearchIntent::{Commercial, Informational};

    vec![
        idea(
            "How to Build AI Agents: A Practical Guide",
            "build AI agents",
            Informational,
            Medium,
            "Artificial Intelligence",
        ),
        idea(
            "What Is Retrieval-Augmented Generation and Why It Matters",
            "retrieval augmented generation",
            Informational,
            Medium,
            "Artificial Intelligence",
        ),
        idea(
            "Fine-Tuning Language Models Step by Step",
            "fine-tune LLM",
            Informational,
            High,
            "Artificial Intelligence",
        ),
        idea(
            "Bitcoin Halving Explained: What Changes for Holders",
            "bitcoin halving",
            Informational,
            Medium,
            "Cryptocurrency",
        ),
        idea(
            "Hardware vs Software Crypto Wallets Compared",
            "hardware wallet vs software wallet",
            Commercial,
            Low,
            "Cryptocurrency",
        ),
        idea(
            "Rust vs Go for Backend Services",
            "rust vs go",
            Commercial,
            High,
            "Technology",
        ),
        idea(
            "How WebAssembly Is Changing Web Performance",
            "webassembly performance",
            Informational,
            Medium,
            "Technology",
        ),
        idea(
            "Index Funds vs ETFs: Which Fits Your Portfolio",
            "index funds vs ETFs",
            Commercial,
            Medium,
            "Finance",
        ),
        idea(
            "What Are Layer 2 Networks and How Do They Scale Ethereum",
            "layer 2 networks",
            Informational,
            Medium,
            "Web3",
        ),
        idea(
            "Smart Contract Security: Common Vulnerabilities and Fixes",
            "smart contract security",
            Informational,
            High,
            "Web3",
        ),
    ]
}

/// One stored article, as recorded in the generation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Slug the article was stored under.
    pub slug: String,
    /// Article title.
    pub title: String,
    /// Category name.
    pub category: String,
    /// When the article was stored.
    pub generated_at: DateTime<Utc>,
    /// Body word count.
    pub word_count: usize,
    /// Model that wrote the body.
    pub model: String,
    /// SHA-256 of the stored body.
    pub fingerprint: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    #[serde(default)]
    articles: Vec<LogEntry>,
}

/// The append-only log of generated articles.
#[derive(Debug, Clone)]
pub struct GenerationLog {
    path: PathBuf,
}

impl GenerationLog {
    /// The log in `data_dir`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOG_FILE),
        }
    }

    /// Every entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn entries(&self) -> Result<Vec<LogEntry>, QueueError> {
        Ok(read_json::<LogFile>(&self.path)?
            .unwrap_or_default()
            .articles)
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or written.
    pub fn append(&self, entry: LogEntry) -> Result<(), QueueError> {
        let mut log = read_json::<LogFile>(&self.path)?.unwrap_or_default();
        log.articles.push(entry);
        write_json(&self.path, &log)
    }
}

/// Hex SHA-256 of an article body.
#[must_use]
pub fn fingerprint(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    format!("{digest:x}")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, QueueError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(QueueError::Io(path.to_path_buf(), e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| QueueError::Json(path.to_path_buf(), e))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), QueueError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| QueueError::Io(parent.to_path_buf(), e))?;
    }
    let json =
        serde_json::to_string_pretty(value).map_err(|e| QueueError::Json(path.to_path_buf(), e))?;
    fs::write(path, json + "\n").map_err(|e| QueueError::Io(path.to_path_buf(), e))
}

/// Errors reading or writing the queue and log files.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The file could not be read or written.
    #[error("failed to access {path}: {error}", path = .0.display(), error = .1)]
    Io(PathBuf, #[source] io::Error),
    /// The file is not valid JSON of the expected shape.
    #[error("invalid JSON in {path}: {error}", path = .0.display(), error = .1)]
    Json(PathBuf, #[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    fn idea(title: &str) -> TopicIdea {
        TopicIdea {
            title: title.to_string(),
            target_keyword: title.to_lowercase(),
            category: "Technology".to_string(),
            ..TopicIdea::default()
        }
    }

    #[test]
    fn missing_queue_is_empty() {
        let tmp = TempDir::new().unwrap();
        let queue = TopicQueue::open(tmp.path()).unwrap();
        assert!(queue.topics().is_empty());
        assert_eq!(queue.total_generated(), 0);
    }

    #[test]
    fn add_save_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();
        let id = queue.add(idea("First")).id;
        queue.add(idea("Second"));
        queue.save().unwrap();

        let reopened = TopicQueue::open(tmp.path()).unwrap();

        assert_eq!(reopened.topics().len(), 2);
        assert_eq!(reopened.topics()[0].id, id);
        assert_eq!(reopened.topics()[0].status, TopicStatus::Pending);
    }

    #[test]
    fn queue_file_uses_camel_case_keys() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();
        queue.add(idea("First"));
        queue.save().unwrap();

        let raw = fs::read_to_string(tmp.path().join(QUEUE_FILE)).unwrap();
        for key in ["targetKeyword", "searchIntent", "createdAt", "lastUpdated", "totalGenerated"] {
            assert!(raw.contains(key), "missing {key}");
        }
        assert!(raw.contains("\"pending\""));
    }

    #[test]
    fn pending_skips_other_statuses() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();
        let first = queue.add(idea("A")).id;
        queue.add(idea("B"));
        queue.add(idea("C"));
        queue.set_status(first, TopicStatus::Failed, None);

        let titles: Vec<_> = queue.pending(5).map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C"]);
        assert_eq!(queue.pending(1).count(), 1);
    }

    #[test]
    fn completing_records_slug_and_count() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();
        let id = queue.add(idea("A")).id;
        let slug = Slug::new("a-post").unwrap();

        assert!(queue.set_status(id, TopicStatus::Completed, Some(&slug)));

        let topic = &queue.topics()[0];
        assert_eq!(topic.article_slug.as_deref(), Some("a-post"));
        assert!(topic.completed_at.is_some());
        assert_eq!(queue.total_generated(), 1);
        assert!(!queue.set_status(Uuid::new_v4(), TopicStatus::Failed, None));
    }

    #[test]
    fn seed_only_fills_an_empty_queue() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();

        let added = queue.seed();

        assert!(added > 0);
        assert_eq!(queue.topics().len(), added);
        assert_eq!(queue.seed(), 0);
    }

    #[test]
    fn cleanup_keeps_the_newest_completed() {
        let tmp = TempDir::new().unwrap();
        let mut queue = TopicQueue::open(tmp.path()).unwrap();
        for i in 0..(KEEP_COMPLETED + 5) {
            let id = queue.add(idea(&format!("Done {i}"))).id;
            queue.set_status(id, TopicStatus::Completed, None);
        }
        queue.add(idea("Still pending"));

        assert_eq!(queue.cleanup(), 5);

        assert_eq!(queue.topics().len(), KEEP_COMPLETED + 1);
        assert_eq!(queue.topics()[0].title, "Done 5");
        assert_eq!(queue.pending(10).count(), 1);
    }

    #[test]
    fn corrupt_queue_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(QUEUE_FILE), "{ not json").unwrap();
        assert!(matches!(
            TopicQueue::open(tmp.path()),
            Err(QueueError::Json(..))
        ));
    }

    #[test]
    fn model_ideas_tolerate_missing_fields() {
        let idea: TopicIdea =
            serde_json::from_str(r#"{"title":"T","targetKeyword":"k","whyItWillRank":"x"}"#)
                .unwrap();
        assert_eq!(idea.search_intent, SearchIntent::Informational);
        assert_eq!(idea.difficulty, Difficulty::Medium);
    }

    #[test_case("informational", SearchIntent::Informational; "lowercase")]
    #[test_case("Commercial", SearchIntent::Commercial; "capitalised")]
    fn intent_from_str(input: &str, expected: SearchIntent) {
        assert_eq!(input.parse::<SearchIntent>().unwrap(), expected);
    }

    #[test]
    fn unknown_difficulty_lists_choices() {
        let err = "extreme".parse::<Difficulty>().unwrap_err();
        assert_eq!(err, "expected one of: low, medium, high");
    }

    #[test]
    fn log_appends() {
        let tmp = TempDir::new().unwrap();
        let log = GenerationLog::new(tmp.path());
        assert!(log.entries().unwrap().is_empty());

        for slug in ["one", "two"] {
            log.append(LogEntry {
                slug: slug.to_string(),
                title: slug.to_uppercase(),
                category: "Technology".to_string(),
                generated_at: Utc::now(),
                word_count: 1200,
                model: "m".to_string(),
                fingerprint: fingerprint(slug),
            })
            .unwrap();
        }

        let slugs: Vec<_> = log.entries().unwrap().into_iter().map(|e| e.slug).collect();
        assert_eq!(slugs, vec!["one", "two"]);
    }

    #[test]
    fn corrupt_queue_names_the_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(QUEUE_FILE);
        fs::write(&path, "{ not json").unwrap();

        let error = TopicQueue::open(tmp.path()).unwrap_err();

        assert!(matches!(error, QueueError::Json(..)));
        assert!(
            error
                .to_string()
                .starts_with(&format!("invalid JSON in {}: ", path.display()))
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
