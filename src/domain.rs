//! Domain models for the article store.
//!
//! This module contains the core domain types including articles, slugs,
//! editorial categories, date handling and configuration.

/// Articles, slugs and frontmatter metadata.
pub mod article;
pub use article::{Article, Draft, Faq, InvalidSlug, Metadata, Slug, count_words};

mod category;
pub use category::{Categories, Category, FALLBACK_EMOJI};

mod config;
pub use config::{
    CONFIG_FILE, Config, ConfigError, ContentConfig, DATA_DIR, GenerationConfig, Pacing,
    QuotaConfig, SiteConfig,
};

/// Best-effort normalization of free-form frontmatter dates.
pub mod date;
