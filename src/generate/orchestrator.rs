//! The per-article generation loop.
//!
//! One article goes topic → research → body → FAQ/metadata → repair →
//! validate → create → verify. Each article gets a fixed number of attempts;
//! a failed article is recorded and the batch moves on. Only quota
//! exhaustion stops a batch early.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{Datelike, Utc};
use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    client::ChatClient,
    decode::{Decoded, decode_json, unwrap_markdown},
    fallback::{CallError, ModelCaller, ModelChain, Quota, pause},
    prompts::{self, budget},
    topics::{
        GenerationLog, LogEntry, QueueError, TopicIdea, TopicQueue, TopicStatus, fingerprint,
    },
};
use crate::{
    domain::{
        Categories, Category, Config, ContentConfig, Draft, FALLBACK_EMOJI, Faq, Metadata, Pacing,
        Slug, count_words, date::month_year,
    },
    repair::repair,
    storage::{CreateError, Directory, frontmatter},
    validation::{Report, Verification, validate, verify_or_rollback},
};

/// Related titles offered to the model for internal links.
const MAX_RELATED: usize = 5;

/// Longest title taken from a topic when metadata has to be filled in.
const MAX_TITLE_CHARS: usize = 60;

/// Reading speed used to estimate read time.
const WORDS_PER_MINUTE: usize = 200;

/// Where one generation attempt ended up.
///
/// `Pending → Validating → {Rejected | Saved} → {Verified | RolledBack}`.
/// Only [`AttemptState::Verified`] is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Calling the model.
    Pending,
    /// Checking the repaired body and metadata.
    Validating,
    /// Validation found blocking issues.
    Rejected,
    /// Written to the store, not yet re-read.
    Saved,
    /// Re-read and sound.
    Verified,
    /// Re-read, found unsound and deleted.
    RolledBack,
}

impl AttemptState {
    /// Whether `next` may follow this state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Validating)
                | (Self::Validating, Self::Rejected | Self::Saved)
                | (Self::Saved, Self::Verified | Self::RolledBack)
        )
    }

    /// Whether the attempt is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Verified | Self::RolledBack)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Saved => "saved",
            Self::Verified => "verified",
            Self::RolledBack => "rolled back",
        })
    }
}

/// Why one generation attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// The model chain produced nothing.
    #[error(transparent)]
    Call(#[from] CallError),
    /// The proposed topic could not be decoded.
    #[error("unusable topic: {0}")]
    Topic(String),
    /// Pre-write validation found blocking issues.
    #[error("validation failed: {0}")]
    Rejected(Report),
    /// No slug could be derived from the metadata.
    #[error("no usable slug in '{0}'")]
    InvalidSlug(String),
    /// The frontmatter could not be rendered.
    #[error("failed to render frontmatter: {0}")]
    Render(#[from] serde_yaml::Error),
    /// The store refused the write.
    #[error(transparent)]
    Store(#[from] CreateError),
    /// Post-write verification failed; the file was deleted.
    #[error("file verification failed: {0}")]
    RolledBack(Report),
}

impl AttemptError {
    /// The state the attempt ended in.
    #[must_use]
    pub const fn state(&self) -> AttemptState {
        match self {
            Self::Rejected(_) => AttemptState::Rejected,
            Self::RolledBack(_) => AttemptState::RolledBack,
            _ => AttemptState::Pending,
        }
    }

    /// Whether the run's quota is used up.
    #[must_use]
    pub const fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::Call(CallError::QuotaExhausted { .. }))
    }
}

/// A verified article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArticle {
    /// Slug it was stored under.
    pub slug: Slug,
    /// Title.
    pub title: String,
    /// File path.
    pub path: PathBuf,
    /// Body word count.
    pub word_count: usize,
    /// Model that wrote the body.
    pub model: String,
    /// Non-blocking validation and verification warnings.
    pub warnings: Vec<String>,
}

/// What happened to one article slot in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stored and verified.
    Saved(SavedArticle),
    /// Every attempt failed; the last error is kept.
    Failed {
        /// Last attempt's error.
        error: String,
    },
}

/// One article slot in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleOutcome {
    /// One-based position in the batch.
    pub index: usize,
    /// Category the article was written for.
    pub category: String,
    /// Result.
    pub outcome: Outcome,
}

/// Results of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// One entry per attempted article.
    pub articles: Vec<ArticleOutcome>,
    /// Calls charged to the quota.
    pub calls_used: u32,
    /// Calls left before the hard limit.
    pub calls_remaining: u32,
    /// The run stopped early because the quota ran out.
    pub quota_exhausted: bool,
}

impl RunSummary {
    /// Stored articles.
    pub fn saved(&self) -> impl Iterator<Item = &SavedArticle> {
        self.articles.iter().filter_map(|a| match &a.outcome {
            Outcome::Saved(saved) => Some(saved),
            Outcome::Failed { .. } => None,
        })
    }

    /// Number of failed articles.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.articles
            .iter()
            .filter(|a| matches!(a.outcome, Outcome::Failed { .. }))
            .count()
    }

    /// Whether every attempted article was stored.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FaqAndMetadata {
    metadata: Draft,
    faqs: Vec<Faq>,
}

/// Drives article generation for one site.
#[derive(Debug)]
pub struct Orchestrator<C> {
    caller: ModelCaller<C>,
    store: Directory,
    limits: ContentConfig,
    categories: Categories,
    queue: TopicQueue,
    log: GenerationLog,
    pacing: Pacing,
    attempts: usize,
    rng: StdRng,
    existing: Vec<(String, String)>,
}

impl<C: ChatClient> Orchestrator<C> {
    /// Creates an orchestrator for the site rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic queue exists but cannot be read.
    pub fn new(client: C, root: &Path, config: &Config) -> Result<Self, QueueError> {
        let data_dir = Config::data_dir(root);
        let pacing = config.generation.pacing();
        let caller = ModelCaller::new(
            client,
            ModelChain::new(config.generation.models()),
            Quota::new(config.quota),
            config.generation.temperature,
            pacing,
        )
        .with_token_cap(config.generation.max_tokens);

        Ok(Self {
            caller,
            store: Directory::from_config(root, config),
            limits: config.content.clone(),
            categories: config.categories(),
            queue: TopicQueue::open(&data_dir)?,
            log: GenerationLog::new(&data_dir),
            pacing,
            attempts: config.generation.attempts_per_article.max(1),
            rng: StdRng::from_os_rng(),
            existing: Vec::new(),
        })
    }

    /// Replaces the random source used for category selection.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// The quota as charged so far.
    pub const fn quota(&self) -> &Quota {
        self.caller.quota()
    }

    /// Generates up to `count` articles.
    #[instrument(skip(self))]
    pub async fn run(&mut self, count: usize) -> RunSummary {
        self.existing = self
            .store
            .list()
            .iter()
            .map(|a| (a.meta().title.clone(), a.meta().category.clone()))
            .collect();
        info!(
            "{} existing articles, starting with {}",
            self.existing.len(),
            self.caller.chain().current()
        );

        let mut summary = RunSummary::default();
        for index in 1..=count {
            let (outcome, quota_exhausted) = self.article(index, count).await;
            summary.articles.push(outcome);
            if quota_exhausted {
                warn!("quota exhausted, stopping the batch");
                summary.quota_exhausted = true;
                break;
            }
            if index < count {
                pause(self.pacing.article).await;
            }
        }

        self.cleanup_queue();
        summary.calls_used = self.caller.quota().used();
        summary.calls_remaining = self.caller.quota().remaining();
        summary
    }

    async fn article(&mut self, index: usize, count: usize) -> (ArticleOutcome, bool) {
        let queued = self
            .queue
            .pending(1)
            .next()
            .map(|topic| (topic.id, topic.idea()));
        let category = match &queued {
            Some((_, idea)) => self
                .categories
                .find(&idea.category)
                .cloned()
                .unwrap_or_else(|| Category::new(idea.category.clone(), FALLBACK_EMOJI, 0)),
            None => self.categories.pick(&mut self.rng).clone(),
        };
        info!("article {index}/{count}: {}", category.name);

        if let Some((id, _)) = &queued {
            self.set_topic_status(*id, TopicStatus::Generating, None);
        }

        let mut last_error = String::new();
        let mut quota_exhausted = false;
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                info!("retry attempt {attempt}/{}", self.attempts);
                pause(self.pacing.attempt).await;
            }

            let topic = queued.as_ref().map(|(_, idea)| idea.clone());
            match self.attempt(&category, topic).await {
                Ok(saved) => {
                    info!("stored {} ({} words)", saved.slug, saved.word_count);
                    if let Some((id, _)) = &queued {
                        self.set_topic_status(*id, TopicStatus::Completed, Some(&saved.slug));
                    }
                    self.existing
                        .push((saved.title.clone(), category.name.clone()));
                    let outcome = ArticleOutcome {
                        index,
                        category: category.name,
                        outcome: Outcome::Saved(saved),
                    };
                    return (outcome, false);
                }
                Err(e) => {
                    warn!("attempt {attempt} ended {}: {e}", e.state());
                    last_error = e.to_string();
                    if e.is_quota_exhausted() {
                        quota_exhausted = true;
                        break;
                    }
                }
            }
        }

        if let Some((id, _)) = &queued {
            let status = if quota_exhausted {
                TopicStatus::Pending
            } else {
                TopicStatus::Failed
            };
            self.set_topic_status(*id, status, None);
        }
        let outcome = ArticleOutcome {
            index,
            category: category.name,
            outcome: Outcome::Failed { error: last_error },
        };
        (outcome, quota_exhausted)
    }

    #[instrument(skip_all, fields(category = %category.name))]
    async fn attempt(
        &mut self,
        category: &Category,
        queued: Option<TopicIdea>,
    ) -> Result<SavedArticle, AttemptError> {
        let mut state = AttemptState::Pending;

        let topic = match queued {
            Some(topic) => topic,
            None => self.fresh_topic(category).await?,
        };
        info!("topic: {}", topic.title);

        let research = self
            .caller
            .call(&prompts::research_and_outline(&topic), budget::RESEARCH)
            .await?;
        let related = self.related_titles(&category.name);
        let content = self
            .caller
            .call(
                &prompts::article(&topic, &research.text, &related),
                budget::ARTICLE,
            )
            .await?;
        let body = repair(&unwrap_markdown(&content.text));
        let words = count_words(&body);

        let faq_response = self
            .caller
            .call(
                &prompts::faq_and_metadata(&topic, &body),
                budget::FAQ_AND_METADATA,
            )
            .await?;
        let (mut draft, faqs) = metadata_or_defaults(decode_json(&faq_response.text), &topic, words);
        let slug = Slug::from_title(&draft.slug).or_else(|_| Slug::from_title(&draft.title));
        draft.slug = slug.as_ref().map(ToString::to_string).unwrap_or_default();

        advance(&mut state, AttemptState::Validating);
        let report = validate(&body, &draft, &faqs, &self.limits);
        if !report.is_valid() {
            advance(&mut state, AttemptState::Rejected);
            return Err(AttemptError::Rejected(report));
        }
        let mut warnings: Vec<String> = report.warnings.iter().map(ToString::to_string).collect();
        for warning in &warnings {
            warn!("{warning}");
        }

        let mut slug = slug.map_err(|_| AttemptError::InvalidSlug(draft.slug.clone()))?;
        if self.store.contains(&slug) {
            let suffixed = slug.with_suffix(Utc::now().timestamp_millis());
            info!("slug {slug} exists, using {suffixed}");
            slug = suffixed;
        }

        let meta = Metadata::assemble(&draft, &slug, category, month_year(Utc::now()), faqs);
        let text = frontmatter::render(&meta, &body)?;
        let path = self.store.create(&slug, &text)?;
        advance(&mut state, AttemptState::Saved);

        match verify_or_rollback(&path, &self.limits) {
            Verification::Verified(report) => {
                advance(&mut state, AttemptState::Verified);
                warnings.extend(report.warnings.iter().map(ToString::to_string));
            }
            Verification::RolledBack(report) => {
                advance(&mut state, AttemptState::RolledBack);
                return Err(AttemptError::RolledBack(report));
            }
        }

        self.record(&slug, &meta, &body, words, &content.model);
        Ok(SavedArticle {
            slug,
            title: meta.title,
            path,
            word_count: words,
            model: content.model,
            warnings,
        })
    }

    async fn fresh_topic(&mut self, category: &Category) -> Result<TopicIdea, AttemptError> {
        let titles: Vec<String> = self.existing.iter().map(|(title, _)| title.clone()).collect();
        let prompt = prompts::fresh_topic(category, &titles, Utc::now().year());
        let completion = self.caller.call(&prompt, budget::TOPIC).await?;

        let mut idea: TopicIdea = decode_json(&completion.text)
            .into_result()
            .map_err(AttemptError::Topic)?;
        if idea.title.trim().is_empty() {
            return Err(AttemptError::Topic("topic has no title".to_string()));
        }
        if idea.target_keyword.trim().is_empty() {
            idea.target_keyword.clone_from(&idea.title);
        }
        idea.category.clone_from(&category.name);
        Ok(idea)
    }

    fn related_titles(&self, category: &str) -> Vec<String> {
        let mut related: Vec<String> = self
            .existing
            .iter()
            .filter(|(_, c)| c.eq_ignore_ascii_case(category))
            .map(|(title, _)| title.clone())
            .take(MAX_RELATED)
            .collect();
        if related.is_empty() {
            related = self
                .existing
                .iter()
                .map(|(title, _)| title.clone())
                .take(MAX_RELATED)
                .collect();
        }
        related
    }

    fn record(&self, slug: &Slug, meta: &Metadata, body: &str, words: usize, model: &str) {
        let entry = LogEntry {
            slug: slug.to_string(),
            title: meta.title.clone(),
            category: meta.category.clone(),
            generated_at: Utc::now(),
            word_count: words,
            model: model.to_string(),
            fingerprint: fingerprint(body),
        };
        if let Err(e) = self.log.append(entry) {
            warn!("failed to update generation log: {e}");
        }
    }

    fn set_topic_status(&mut self, id: Uuid, status: TopicStatus, slug: Option<&Slug>) {
        self.queue.set_status(id, status, slug);
        if let Err(e) = self.queue.save() {
            warn!("failed to save topic queue: {e}");
        }
    }

    fn cleanup_queue(&mut self) {
        let removed = self.queue.cleanup();
        if removed > 0 {
            debug!("removed {removed} old completed topics");
            if let Err(e) = self.queue.save() {
                warn!("failed to save topic queue: {e}");
            }
        }
    }
}

fn advance(state: &mut AttemptState, next: AttemptState) {
    debug_assert!(state.can_advance_to(next), "{state} -> {next}");
    debug!("attempt {state} -> {next}");
    *state = next;
}

/// Fills generated metadata, substituting topic-derived defaults when the
/// response could not be decoded or left fields empty.
fn metadata_or_defaults(
    decoded: Decoded<FaqAndMetadata>,
    topic: &TopicIdea,
    words: usize,
) -> (Draft, Vec<Faq>) {
    let FaqAndMetadata {
        metadata: mut draft,
        faqs,
    } = decoded.unwrap_or_else(|reason| {
        warn!("FAQ/metadata response unusable, using defaults: {reason}");
        FaqAndMetadata {
            metadata: Draft::default(),
            faqs: vec![Faq {
                question: format!("What is {}?", topic.target_keyword),
                answer: format!(
                    "{} is the main subject of this guide; the sections above cover it in depth.",
                    topic.target_keyword
                ),
            }],
        }
    });

    if draft.title.trim().is_empty() {
        draft.title = topic.title.chars().take(MAX_TITLE_CHARS).collect();
    }
    if draft.description.trim().is_empty() {
        draft.description = format!(
            "Comprehensive guide to {}. Learn everything you need to know.",
            topic.target_keyword
        );
    }
    if draft.slug.trim().is_empty() {
        draft.slug.clone_from(&draft.title);
    }
    if draft.keywords.is_empty() {
        draft.keywords = vec![topic.target_keyword.clone(), topic.category.to_lowercase()];
    }
    if draft.read_time.trim().is_empty() {
        draft.read_time = format!("{} min read", words.div_ceil(WORDS_PER_MINUTE).max(1));
    }

    let faqs = faqs
        .into_iter()
        .map(|faq| Faq {
            question: single_line(&faq.question),
            answer: single_line(&faq.answer),
        })
        .filter(|faq| !faq.question.is_empty() && !faq.answer.is_empty())
        .collect();
    (draft, faqs)
}

fn single_line(text: &str) -> String {
    repair(text).split_whitespace().collect::<Vec<_>>().join(" ")
}
