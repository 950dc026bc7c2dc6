use std::{fmt, ops::Deref, str::FromStr};

use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use pulldown_cmark::{Options, Parser, html};
use serde::{Deserialize, Serialize};

use super::{Category, date::normalize_date};

/// Maximum length of a slug derived from a title.
pub const MAX_SLUG_LEN: usize = 60;

/// A filesystem-safe article identifier.
///
/// Slugs are non-empty and contain only ASCII letters, digits, `-` and `_`.
/// The slug of a stored article is its file name without the extension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Slug(NonEmptyString);

impl Slug {
    /// Creates a slug from an already slug-shaped string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSlug`] if the string is empty or contains characters
    /// that are not filesystem safe.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidSlug> {
        let s = s.into();
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(InvalidSlug(s));
        }
        NonEmptyString::new(s).map(Self).map_err(InvalidSlug)
    }

    /// Derives a slug from a free-form title.
    ///
    /// The title is transliterated to lowercase ASCII, runs of other
    /// characters collapse to a single `-`, and the result is truncated to
    /// [`MAX_SLUG_LEN`] characters.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSlug`] if nothing slug-worthy remains.
    pub fn from_title(title: &str) -> Result<Self, InvalidSlug> {
        let slugified = slug::slugify(title);
        let truncated: String = slugified.chars().take(MAX_SLUG_LEN).collect();
        Self::new(truncated.trim_matches('-'))
    }

    /// Returns a new slug with `-{suffix}` appended.
    #[must_use]
    pub fn with_suffix(&self, suffix: impl fmt::Display) -> Self {
        Self::new(format!("{}-{suffix}", self.as_str())).unwrap_or_else(|_| self.clone())
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Slug {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slug {
    type Err = InvalidSlug;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Slug {
    type Error = InvalidSlug;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Error returned when a string is not a valid slug.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid slug '{0}': must be non-empty and contain only ASCII letters, digits, '-' or '_'")]
pub struct InvalidSlug(String);

/// A question and answer pair surfaced as FAQ structured data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    /// The question.
    pub question: String,
    /// The answer.
    pub answer: String,
}

/// Frontmatter metadata of a stored article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Article title.
    pub title: String,
    /// SEO description.
    pub description: String,
    /// Publication date, either ISO-8601 or "Month Year".
    pub date: String,
    /// Date of the last edit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Human-readable reading time estimate, e.g. "12 min read".
    #[serde(default)]
    pub read_time: String,
    /// Editorial category name.
    pub category: String,
    /// Display glyph of the category at creation time.
    #[serde(default)]
    pub emoji: String,
    /// Slug as recorded in the frontmatter.
    #[serde(default)]
    pub slug: String,
    /// SEO keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Frequently asked questions.
    #[serde(default)]
    pub faqs: Vec<Faq>,
}

impl Metadata {
    /// Builds the frontmatter for a new article from generated metadata.
    ///
    /// The emoji is taken from the category and the slug from `slug`, which
    /// may differ from `draft.slug` after sanitising or collision suffixing.
    #[must_use]
    pub fn assemble(
        draft: &Draft,
        slug: &Slug,
        category: &Category,
        date: String,
        faqs: Vec<Faq>,
    ) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            date,
            date_modified: None,
            read_time: draft.read_time.clone(),
            category: category.name.clone(),
            emoji: category.emoji.clone(),
            slug: slug.to_string(),
            keywords: draft.keywords.clone(),
            faqs,
        }
    }
}

/// Metadata produced by the generator before an article is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    /// Proposed title.
    pub title: String,
    /// Proposed description.
    pub description: String,
    /// Proposed slug; not yet validated.
    pub slug: String,
    /// Proposed keywords.
    pub keywords: Vec<String>,
    /// Proposed reading time.
    pub read_time: String,
}

/// A parsed article: its slug, frontmatter metadata and Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    slug: Slug,
    meta: Metadata,
    body: String,
}

impl Article {
    /// Creates an article from its parts.
    #[must_use]
    pub const fn new(slug: Slug, meta: Metadata, body: String) -> Self {
        Self { slug, meta, body }
    }

    /// The slug, derived from the file name.
    #[must_use]
    pub const fn slug(&self) -> &Slug {
        &self.slug
    }

    /// The frontmatter metadata.
    #[must_use]
    pub const fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// The Markdown body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the article, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> (Slug, Metadata, String) {
        (self.slug, self.meta, self.body)
    }

    /// The publication date, normalized to UTC.
    ///
    /// Falls back to the current time if the stored date is unparseable.
    #[must_use]
    pub fn published(&self) -> DateTime<Utc> {
        normalize_date(&self.meta.date, Utc::now())
    }

    /// Number of whitespace-separated words in the body.
    #[must_use]
    pub fn word_count(&self) -> usize {
        count_words(&self.body)
    }

    /// Renders the body to HTML with GitHub-flavoured extensions.
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);

        let parser = Parser::new_ext(&self.body, options);
        let mut out = String::with_capacity(self.body.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Counts whitespace-separated words.
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("test-article"; "kebab")]
    #[test_case("post_2025"; "underscore and digits")]
    #[test_case("foo-1735689600000"; "timestamp suffix")]
    fn valid_slugs(input: &str) {
        assert_eq!(Slug::new(input).unwrap().as_str(), input);
    }

    #[test_case(""; "empty")]
    #[test_case("has space"; "space")]
    #[test_case("../escape"; "path traversal")]
    #[test_case("a/b"; "separator")]
    fn invalid_slugs(input: &str) {
        assert!(Slug::new(input).is_err());
    }

    #[test]
    fn slug_from_title() {
        let slug = Slug::from_title("How to Build AI Agents: A Complete Guide!").unwrap();
        assert_eq!(slug.as_str(), "how-to-build-ai-agents-a-complete-guide");
    }

    #[test]
    fn slug_from_long_title_is_truncated() {
        let title = "word ".repeat(40);
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slug_from_symbols_only_fails() {
        assert!(Slug::from_title("!!! ???").is_err());
    }

    #[test]
    fn suffixed_slug() {
        let slug = Slug::new("foo").unwrap();
        assert_eq!(slug.with_suffix(1_700_000_000_000_u64).as_str(), "foo-1700000000000");
    }

    #[test]
    fn render_html_supports_tables() {
        let article = Article::new(
            Slug::new("t").unwrap(),
            sample_meta(),
            "## Heading\n\n| A | B |\n| --- | --- |\n| 1 | 2 |\n".to_string(),
        );
        let html = article.render_html();
        assert!(html.contains("<h2>Heading</h2>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn words_are_counted_on_whitespace() {
        assert_eq!(count_words("## Intro\n\nSome text. "), 4);
        assert_eq!(count_words("   "), 0);
    }

    fn sample_meta() -> Metadata {
        Metadata {
            title: "Title".to_string(),
            description: "Description".to_string(),
            date: "January 2025".to_string(),
            date_modified: None,
            read_time: "5 min read".to_string(),
            category: "Technology".to_string(),
            emoji: "💻".to_string(),
            slug: "t".to_string(),
            keywords: vec![],
            faqs: vec![],
        }
    }
}
