use serde_yaml::{Mapping, Value};

use crate::domain::Metadata;

/// The line that opens and closes a frontmatter block.
pub const MARKER: &str = "---";

/// Keys that must be present for a block to parse.
pub const REQUIRED_KEYS: [&str; 4] = ["title", "description", "date", "category"];

/// Splits raw file text into the frontmatter block and the remainder.
///
/// The opening marker must be the very first line of the text; the block
/// ends at the next line consisting only of the marker. The remainder is
/// everything after the closing marker line.
///
/// # Errors
///
/// Returns [`ParseError::MissingOpening`] or [`ParseError::MissingClosing`]
/// if either marker is absent.
pub fn split(text: &str) -> Result<(&str, &str), ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let (first, mut rest) = next_line(text).ok_or(ParseError::MissingOpening)?;
    if first.trim_end() != MARKER {
        return Err(ParseError::MissingOpening);
    }

    let block_start = text.len() - rest.len();
    loop {
        let line_start = text.len() - rest.len();
        let (line, after) = next_line(rest).ok_or(ParseError::MissingClosing)?;
        if line.trim_end() == MARKER {
            let block = text[block_start..line_start].trim_end_matches(['\r', '\n']);
            return Ok((block, after));
        }
        rest = after;
    }
}

/// Parses raw file text into metadata and body.
///
/// Blank lines between the closing marker and the body are dropped, as is
/// trailing whitespace at the end of the body.
///
/// # Errors
///
/// Returns an error if a marker is missing, the block is not a YAML mapping,
/// a required key is absent, or a value has the wrong shape.
pub fn parse(text: &str) -> Result<(Metadata, String), ParseError> {
    let (block, remainder) = split(text)?;

    let value: Value = serde_yaml::from_str(block)?;
    let Value::Mapping(mapping) = value else {
        return Err(ParseError::NotAMapping);
    };
    check_required(&mapping)?;

    let metadata: Metadata = serde_yaml::from_value(Value::Mapping(mapping))?;
    let body = remainder
        .trim_start_matches(['\r', '\n'])
        .trim_end()
        .to_string();

    Ok((metadata, body))
}

/// Renders metadata and body as file text.
///
/// The output is a marker line, the YAML block, a closing marker, a blank
/// line and the body, terminated by a newline.
///
/// # Errors
///
/// Returns an error if the metadata cannot be serialized.
pub fn render(metadata: &Metadata, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(metadata)?;
    Ok(format!("{MARKER}\n{yaml}{MARKER}\n\n{}\n", body.trim_end()))
}

fn check_required(mapping: &Mapping) -> Result<(), ParseError> {
    for key in REQUIRED_KEYS {
        if !mapping.contains_key(key) {
            return Err(ParseError::MissingField(key));
        }
    }
    Ok(())
}

/// Returns the next line (without its terminator) and the text after it.
fn next_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    Some(match text.find('\n') {
        Some(idx) => (text[..idx].trim_end_matches('\r'), &text[idx + 1..]),
        None => (text, ""),
    })
}

/// Errors that can occur when parsing frontmatter.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The text does not start with a marker line.
    #[error("expected frontmatter starting with '{MARKER}'")]
    MissingOpening,
    /// No closing marker line follows the opening one.
    #[error("frontmatter is not closed by a '{MARKER}' line")]
    MissingClosing,
    /// The block is valid YAML but not a mapping.
    #[error("frontmatter is not a key-value mapping")]
    NotAMapping,
    /// A required key is absent.
    #[error("missing frontmatter field: {0}")]
    MissingField(&'static str),
    /// The block is not valid YAML or a value has the wrong shape.
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Faq;

    fn sample_metadata() -> Metadata {
        Metadata {
            title: "Test Article: A Guide".to_string(),
            description: "A test".to_string(),
            date: "January 2025".to_string(),
            date_modified: None,
            read_time: "8 min read".to_string(),
            category: "Technology".to_string(),
            emoji: "💻".to_string(),
            slug: "test-article".to_string(),
            keywords: vec!["a".to_string(), "b".to_string()],
            faqs: vec![Faq {
                question: "What is it?".to_string(),
                answer: "A test, with \"quotes\".".to_string(),
            }],
        }
    }

    #[test]
    fn parses_scalars_lists_and_faqs() {
        let input = r#"---
title: "Hello World"
description: "Greeting"
date: "March 2025"
readTime: "5 min read"
category: "Technology"
emoji: "💻"
slug: "hello-world"
keywords: ["hello", "world"]
faqs:
  - question: "Why?"
    answer: "Because."
---

## Intro

Body text.
"#;

        let (meta, body) = parse(input).unwrap();

        assert_eq!(meta.title, "Hello World");
        assert_eq!(meta.read_time, "5 min read");
        assert_eq!(meta.keywords, vec!["hello", "world"]);
        assert_eq!(meta.faqs.len(), 1);
        assert_eq!(meta.faqs[0].answer, "Because.");
        assert_eq!(body, "## Intro\n\nBody text.");
    }

    #[test]
    fn render_then_parse_round_trips() {
        let meta = sample_metadata();
        let body = "## Heading\n\nSome body.\n\n| A | B |\n| --- | --- |\n| 1 | 2 |";

        let text = render(&meta, body).unwrap();
        let (parsed, parsed_body) = parse(&text).unwrap();

        assert_eq!(parsed, meta);
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn rendered_keys_are_literal_lines() {
        let text = render(&sample_metadata(), "body").unwrap();
        for key in ["title:", "description:", "date:", "slug:", "category:", "readTime:"] {
            assert!(text.lines().any(|line| line.starts_with(key)), "missing {key}");
        }
    }

    #[test]
    fn body_may_contain_markers() {
        let input = "---\ntitle: t\ndescription: d\ndate: d\ncategory: c\n---\nabove\n---\nbelow\n";
        let (_, body) = parse(input).unwrap();
        assert_eq!(body, "above\n---\nbelow");
    }

    #[test]
    fn crlf_line_endings() {
        let input = "---\r\ntitle: t\r\ndescription: d\r\ndate: d\r\ncategory: c\r\n---\r\n\r\nbody\r\n";
        let (meta, body) = parse(input).unwrap();
        assert_eq!(meta.title, "t");
        assert_eq!(body, "body");
    }

    #[test]
    fn missing_opening_marker() {
        let result = parse("title: t\n---\nbody");
        assert!(matches!(result, Err(ParseError::MissingOpening)));
    }

    #[test]
    fn opening_marker_must_be_at_offset_zero() {
        let result = parse("\n---\ntitle: t\n---\nbody");
        assert!(matches!(result, Err(ParseError::MissingOpening)));
    }

    #[test]
    fn missing_closing_marker() {
        let result = parse("---\ntitle: t\ndescription: d\n\nbody without end");
        assert!(matches!(result, Err(ParseError::MissingClosing)));
    }

    #[test]
    fn empty_input() {
        assert!(matches!(parse(""), Err(ParseError::MissingOpening)));
    }

    #[test]
    fn missing_required_field() {
        let input = "---\ntitle: t\ndescription: d\ndate: d\n---\nbody";
        let result = parse(input);
        assert!(matches!(result, Err(ParseError::MissingField("category"))));
    }

    #[test]
    fn scalar_block_is_not_a_mapping() {
        let result = parse("---\njust a string\n---\nbody");
        assert!(matches!(result, Err(ParseError::NotAMapping)));
    }

    #[test]
    fn invalid_yaml() {
        let input = "---\ntitle: [unclosed\ndescription: d\n---\nbody";
        assert!(matches!(parse(input), Err(ParseError::Yaml(_))));
    }

    #[test]
    fn wrong_shape_is_a_yaml_error() {
        let input = "---\ntitle: t\ndescription: d\ndate: d\ncategory: c\nkeywords: 3\n---\nbody";
        assert!(matches!(parse(input), Err(ParseError::Yaml(_))));
    }
}
