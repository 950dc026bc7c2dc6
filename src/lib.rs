//! Generated-content pipeline for a static article site
//!
//! Articles are Markdown documents with YAML frontmatter, stored one file per
//! slug in a content directory. The [`generate`] module drives a model
//! fallback chain to write new articles, [`repair`] cleans the raw model
//! output, and [`validation`] gates what reaches the store.

pub mod domain;
pub use domain::{
    Article, CONFIG_FILE, Categories, Category, Config, ConfigError, DATA_DIR, Draft, Faq,
    Metadata, Slug,
};

/// Filesystem storage for articles.
pub mod storage;
pub use storage::{CreateError, Directory, Listing, LoadError};

pub mod repair;
pub use repair::repair;

pub mod validation;

pub mod generate;

pub mod feed;
