//! Checks run before and after an article is written.
//!
//! [`validate`] gates a candidate body and its generated metadata before
//! anything touches the disk. [`verify`] re-reads a written file and checks
//! that it is structurally sound; [`verify_or_rollback`] deletes the file if
//! it is not.

use std::{fmt, fs, path::Path, sync::LazyLock};

use regex::Regex;

use crate::{
    domain::{ContentConfig, Draft, Faq, count_words},
    repair::has_leftover_annotations,
    storage::frontmatter::{self, MARKER},
};

/// Keys a written file must carry as literal top-level lines.
pub const VERIFIED_KEYS: [&str; 5] = ["title", "description", "date", "slug", "category"];

static H2_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##\s+").expect("heading pattern is valid"));

static FRONTMATTER_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^{MARKER}\r?\n((?s).*?)\r?\n{MARKER}"))
        .expect("frontmatter pattern is valid")
});

static DOUBLE_SPACED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r": {2,}").expect("spacing pattern is valid"));

/// A problem that blocks an article from being stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// The body is below the hard word floor.
    TooFewWords {
        /// Words found.
        words: usize,
        /// Configured floor.
        min: usize,
    },
    /// The title is missing or too short.
    TitleTooShort,
    /// The slug is missing or too short.
    SlugTooShort,
    /// The body has no `##` heading.
    NoHeadings,
    /// The written file could not be read back.
    Unreadable(String),
    /// The written file has no frontmatter block.
    NoFrontmatter,
    /// The written frontmatter lacks a required key line.
    MissingField(&'static str),
    /// The written file does not parse.
    Unparseable(String),
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewWords { words, min } => {
                write!(f, "word count too low: {words} (minimum {min})")
            }
            Self::TitleTooShort => f.write_str("title missing or too short"),
            Self::SlugTooShort => f.write_str("slug missing or too short"),
            Self::NoHeadings => f.write_str("no H2 headings found"),
            Self::Unreadable(e) => write!(f, "cannot read file: {e}"),
            Self::NoFrontmatter => f.write_str("no frontmatter found"),
            Self::MissingField(key) => write!(f, "missing frontmatter field: {key}"),
            Self::Unparseable(e) => write!(f, "file does not parse: {e}"),
        }
    }
}

/// A problem worth reporting that does not block storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The body is below the soft word target.
    BelowTarget {
        /// Words found.
        words: usize,
        /// Configured target.
        target: usize,
    },
    /// The description is missing or short.
    ShortDescription,
    /// Fewer than two keywords.
    FewKeywords,
    /// No FAQs were generated.
    NoFaqs,
    /// An odd number of code fences.
    UnclosedCodeBlock,
    /// Reasoning tags survived repair.
    LeftoverAnnotations,
    /// A frontmatter value is preceded by more than one space.
    IrregularSpacing,
    /// The written file is suspiciously small.
    SmallFile {
        /// File size in bytes.
        bytes: u64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowTarget { words, target } => {
                write!(f, "word count below target: {words} (target {target})")
            }
            Self::ShortDescription => f.write_str("description missing or short"),
            Self::FewKeywords => f.write_str("fewer than 2 keywords"),
            Self::NoFaqs => f.write_str("no FAQs generated"),
            Self::UnclosedCodeBlock => f.write_str("unclosed code block"),
            Self::LeftoverAnnotations => f.write_str("reasoning tags still present"),
            Self::IrregularSpacing => f.write_str("irregular spacing in frontmatter"),
            Self::SmallFile { bytes } => write!(f, "file is only {bytes} bytes"),
        }
    }
}

/// The outcome of a validation or verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Blocking problems.
    pub issues: Vec<Issue>,
    /// Non-blocking problems.
    pub warnings: Vec<Warning>,
}

impl Report {
    /// Whether the report has no blocking issues.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Validates a repaired body and its metadata before it is written.
#[must_use]
pub fn validate(content: &str, draft: &Draft, faqs: &[Faq], limits: &ContentConfig) -> Report {
    let mut report = Report::default();
    let words = count_words(content);

    if words < limits.min_words {
        report.issues.push(Issue::TooFewWords {
            words,
            min: limits.min_words,
        });
    } else if words < limits.target_words {
        report.warnings.push(Warning::BelowTarget {
            words,
            target: limits.target_words,
        });
    }

    if draft.title.trim().chars().count() < limits.min_title_len {
        report.issues.push(Issue::TitleTooShort);
    }
    if draft.slug.trim().chars().count() < limits.min_slug_len {
        report.issues.push(Issue::SlugTooShort);
    }
    if !H2_HEADING.is_match(content) {
        report.issues.push(Issue::NoHeadings);
    }

    if draft.description.trim().chars().count() < limits.min_description_len {
        report.warnings.push(Warning::ShortDescription);
    }
    if draft.keywords.len() < 2 {
        report.warnings.push(Warning::FewKeywords);
    }
    if faqs.is_empty() {
        report.warnings.push(Warning::NoFaqs);
    }
    if content.matches("```").count() % 2 != 0 {
        report.warnings.push(Warning::UnclosedCodeBlock);
    }
    if has_leftover_annotations(content) {
        report.warnings.push(Warning::LeftoverAnnotations);
    }

    report
}

/// Re-reads a written article file and checks its structure.
#[must_use]
pub fn verify(path: &Path, limits: &ContentConfig) -> Report {
    let mut report = Report::default();

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            report.issues.push(Issue::Unreadable(e.to_string()));
            return report;
        }
    };

    let Some(block) = FRONTMATTER_BLOCK.captures(&text).and_then(|caps| caps.get(1)) else {
        report.issues.push(Issue::NoFrontmatter);
        return report;
    };
    let block = block.as_str();

    for key in VERIFIED_KEYS {
        let prefix = format!("{key}:");
        if !block.lines().any(|line| line.starts_with(&prefix)) {
            report.issues.push(Issue::MissingField(key));
        }
    }
    if report.is_valid() {
        if let Err(e) = frontmatter::parse(&text) {
            report.issues.push(Issue::Unparseable(e.to_string()));
        }
    }

    if DOUBLE_SPACED_VALUE.is_match(block) {
        report.warnings.push(Warning::IrregularSpacing);
    }
    let bytes = text.len() as u64;
    if bytes < limits.min_file_bytes {
        report.warnings.push(Warning::SmallFile { bytes });
    }

    report
}

/// The outcome of [`verify_or_rollback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The file is sound and stays in place.
    Verified(Report),
    /// The file failed verification and was deleted.
    RolledBack(Report),
}

/// Verifies a written file, deleting it if verification fails.
#[must_use]
pub fn verify_or_rollback(path: &Path, limits: &ContentConfig) -> Verification {
    let report = verify(path, limits);
    if report.is_valid() {
        return Verification::Verified(report);
    }

    match fs::remove_file(path) {
        Ok(()) => tracing::info!("removed unverified file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("failed to remove unverified file {}: {e}", path.display()),
    }
    Verification::RolledBack(report)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{Metadata, Slug},
        storage::{Directory, LoadError},
    };

    fn draft() -> Draft {
        Draft {
            title: "Test Article".to_string(),
            description: "A test".to_string(),
            slug: "test-article".to_string(),
            keywords: vec!["a".to_string(), "b".to_string()],
            read_time: "5 min read".to_string(),
        }
    }

    fn limits() -> ContentConfig {
        ContentConfig::default()
    }

    #[test]
    fn minimal_valid_article() {
        let body = "## Intro\n\nSome text. ".repeat(200);

        let report = validate(&body, &draft(), &[], &limits());

        assert!(report.is_valid(), "{:?}", report.issues);
        assert!(report.warnings.contains(&Warning::NoFaqs));
    }

    #[test_case(0; "empty")]
    #[test_case(10; "tiny")]
    #[test_case(499; "one below the floor")]
    fn below_the_floor_is_rejected(words: usize) {
        let body = format!("## Heading\n\n{}", "word ".repeat(words.saturating_sub(2)));
        let report = validate(&body, &draft(), &[], &limits());
        assert!(
            report
                .issues
                .iter()
                .any(|issue| matches!(issue, Issue::TooFewWords { .. }))
        );
    }

    #[test]
    fn at_the_floor_is_accepted() {
        let body = format!("## Heading\n\n{}", "word ".repeat(498));
        assert_eq!(count_words(&body), 500);
        assert!(validate(&body, &draft(), &[], &limits()).is_valid());
    }

    #[test]
    fn structural_issues() {
        let body = "# Only H1\n\n".to_string() + &"word ".repeat(600);
        let draft = Draft {
            title: "Short".to_string(),
            slug: "abc".to_string(),
            ..draft()
        };

        let report = validate(&body, &draft, &[], &limits());

        assert_eq!(
            report.issues,
            vec![Issue::TitleTooShort, Issue::SlugTooShort, Issue::NoHeadings]
        );
    }

    #[test]
    fn warnings_do_not_block() {
        let body = "## H\n\n```rust\nfn main() {}\n\n<think>oops\n".to_string() + &"w ".repeat(600);
        let draft = Draft {
            keywords: vec!["only".to_string()],
            ..draft()
        };
        let faqs = [Faq {
            question: "q".to_string(),
            answer: "a".to_string(),
        }];

        let report = validate(&body, &draft, &faqs, &limits());

        assert!(report.is_valid());
        assert_eq!(
            report.warnings,
            vec![
                Warning::BelowTarget {
                    words: count_words(&body),
                    target: 2500
                },
                Warning::ShortDescription,
                Warning::FewKeywords,
                Warning::UnclosedCodeBlock,
                Warning::LeftoverAnnotations,
            ]
        );
    }

    fn meta() -> Metadata {
        Metadata {
            title: "Test Article".to_string(),
            description: "A description long enough to pass every check we run".to_string(),
            date: "January 2025".to_string(),
            date_modified: None,
            read_time: "5 min read".to_string(),
            category: "Technology".to_string(),
            emoji: "💻".to_string(),
            slug: "test-article".to_string(),
            keywords: vec!["a".to_string(), "b".to_string()],
            faqs: vec![],
        }
    }

    #[test]
    fn verify_accepts_rendered_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.mdx");
        let body = "## Intro\n\nSome text. ".repeat(200);
        fs::write(&path, frontmatter::render(&meta(), &body).unwrap()).unwrap();

        let report = verify(&path, &limits());

        assert_eq!(report, Report::default());
    }

    #[test]
    fn verify_warns_on_small_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.mdx");
        fs::write(&path, frontmatter::render(&meta(), "## H").unwrap()).unwrap();

        let report = verify(&path, &limits());

        assert!(report.is_valid());
        assert!(matches!(report.warnings[..], [Warning::SmallFile { .. }]));
    }

    #[test]
    fn verify_rejects_missing_frontmatter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.mdx");
        fs::write(&path, "## Just a body").unwrap();
        assert_eq!(verify(&path, &limits()).issues, vec![Issue::NoFrontmatter]);
    }

    #[test]
    fn verify_reports_unreadable_files() {
        let tmp = TempDir::new().unwrap();
        let report = verify(&tmp.path().join("missing.mdx"), &limits());
        assert!(matches!(report.issues[..], [Issue::Unreadable(_)]));
    }

    #[test]
    fn verify_reports_unparseable_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.mdx");
        let text = "---\ntitle: t\ndescription: d\ndate: d\nslug: s\ncategory: c\nfaqs:  7\n---\n\nbody";
        fs::write(&path, text).unwrap();

        let report = verify(&path, &limits());

        assert!(matches!(report.issues[..], [Issue::Unparseable(_)]));
        assert!(report.warnings.contains(&Warning::IrregularSpacing));
    }

    #[test]
    fn rollback_removes_file_missing_a_field() {
        let tmp = TempDir::new().unwrap();
        let store = Directory::new(tmp.path().to_path_buf(), "mdx");
        let slug = Slug::new("no-category").unwrap();
        let text = "---\ntitle: Test Article\ndescription: d\ndate: January 2025\nslug: no-category\n---\n\n## Body\n";
        let path = store.create(&slug, text).unwrap();

        let outcome = verify_or_rollback(&path, &limits());

        let Verification::RolledBack(report) = outcome else {
            panic!("expected rollback, got {outcome:?}");
        };
        assert_eq!(report.issues, vec![Issue::MissingField("category")]);
        assert!(!path.exists());
        assert!(matches!(store.get("no-category"), Err(LoadError::NotFound)));
    }

    #[test]
    fn sound_file_is_kept() {
        let tmp = TempDir::new().unwrap();
        let store = Directory::new(tmp.path().to_path_buf(), "mdx");
        let slug = Slug::new("test-article").unwrap();
        let body = "## Intro\n\nSome text. ".repeat(200);
        let path = store
            .create(&slug, &frontmatter::render(&meta(), &body).unwrap())
            .unwrap();

        assert!(matches!(
            verify_or_rollback(&path, &limits()),
            Verification::Verified(_)
        ));
        assert!(store.contains(&slug));
    }
}
