//! Model-driven article generation.
//!
//! The [`Orchestrator`] writes articles by calling a [`ChatClient`] through a
//! [`ModelCaller`] fallback chain, then repairs, validates, stores and
//! verifies each one. Topics come from the [`TopicQueue`] when it has
//! pending entries and from the model otherwise.

mod client;
pub use client::{ChatClient, ChatRequest, CompletionError, OpenRouterClient, SYSTEM_PROMPT};

mod decode;
pub use decode::{Decoded, decode_json, unwrap_markdown};

mod fallback;
pub use fallback::{CallError, Completion, MIN_RESPONSE_CHARS, ModelCaller, ModelChain, Quota};

mod orchestrator;
pub use orchestrator::{
    ArticleOutcome, AttemptError, AttemptState, Orchestrator, Outcome, RunSummary, SavedArticle,
};

pub mod prompts;

pub mod topics;
pub use topics::{
    Difficulty, GenerationLog, LogEntry, QueueError, SearchIntent, Topic, TopicIdea, TopicQueue,
    TopicStatus, fingerprint,
};
