use serde::de::DeserializeOwned;

use crate::repair::strip_annotations;

/// The result of decoding structured data from model output.
///
/// Decoding never fails past this boundary: anything that cannot be decoded
/// becomes [`Decoded::Fallback`] and the caller decides what to substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The payload decoded cleanly.
    Value(T),
    /// Nothing usable was found.
    Fallback {
        /// Why decoding failed.
        reason: String,
    },
}

impl<T> Decoded<T> {
    /// Returns the value, or computes a substitute from the failure reason.
    pub fn unwrap_or_else(self, f: impl FnOnce(&str) -> T) -> T {
        match self {
            Self::Value(value) => value,
            Self::Fallback { reason } => f(&reason),
        }
    }

    /// Converts into a `Result`, with the failure reason as the error.
    ///
    /// # Errors
    ///
    /// Returns the reason if this is a fallback.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Fallback { reason } => Err(reason),
        }
    }
}

/// Decodes a JSON payload from raw model output.
///
/// Reasoning tags and code fences are removed, then the span from the first
/// `{` or `[` to the last `}` or `]` is deserialized.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Decoded<T> {
    let cleaned = strip_annotations(raw);
    let cleaned = strip_fence(&cleaned, &["json"]);

    let Some(payload) = json_span(cleaned) else {
        return Decoded::Fallback {
            reason: "no JSON content found in response".to_string(),
        };
    };

    match serde_json::from_str(payload) {
        Ok(value) => Decoded::Value(value),
        Err(e) => Decoded::Fallback {
            reason: format!("invalid JSON: {e}"),
        },
    }
}

/// Unwraps a Markdown reply from reasoning tags and an outer code fence.
///
/// Only a fence that wraps the whole reply is removed, and only when it is
/// bare or tagged `markdown`, `md` or `mdx`. Fenced blocks inside the body
/// are left alone.
#[must_use]
pub fn unwrap_markdown(raw: &str) -> String {
    let cleaned = strip_annotations(raw);
    strip_fence(&cleaned, &["markdown", "md", "mdx"]).to_string()
}

/// Removes one outer fence whose info string is empty or one of `tags`.
fn strip_fence<'a>(text: &'a str, tags: &[&str]) -> &'a str {
    let trimmed = text.trim();
    let Some((info, rest)) = trimmed
        .strip_prefix("```")
        .and_then(|inner| inner.split_once('\n'))
    else {
        return trimmed;
    };
    let info = info.trim();
    if !info.is_empty() && !tags.iter().any(|tag| info.eq_ignore_ascii_case(tag)) {
        return trimmed;
    }
    rest.trim_end()
        .strip_suffix("```")
        .map_or(trimmed, str::trim)
}

fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Topic {
        title: String,
    }

    #[test]
    fn plain_object() {
        let decoded: Decoded<Topic> = decode_json(r#"{"title":"Rust"}"#);
        assert_eq!(
            decoded,
            Decoded::Value(Topic {
                title: "Rust".to_string()
            })
        );
    }

    #[test]
    fn fenced_and_annotated() {
        let raw = "<think>pick something</think>\n```json\n{\"title\": \"Rust\"}\n```";
        let decoded: Decoded<Topic> = decode_json(raw);
        assert!(matches!(decoded, Decoded::Value(t) if t.title == "Rust"));
    }

    #[test]
    fn surrounded_by_prose() {
        let raw = "Here you go:\n[{\"title\": \"a\"}, {\"title\": \"b\"}]\nEnjoy!";
        let decoded: Decoded<Vec<Topic>> = decode_json(raw);
        assert_eq!(decoded.into_result().unwrap().len(), 2);
    }

    #[test]
    fn markdown_wrapper_is_removed() {
        let raw = "<think>outline first</think>\n```markdown\n## Intro\n\nText.\n```\n";
        assert_eq!(unwrap_markdown(raw), "## Intro\n\nText.");
    }

    #[test]
    fn bare_wrapper_is_removed() {
        assert_eq!(unwrap_markdown("```\n## Intro\n```"), "## Intro");
    }

    #[test]
    fn inner_code_blocks_are_kept() {
        let raw = "## Intro\n\n```rust\nfn main() {}\n```";
        assert_eq!(unwrap_markdown(raw), raw);
    }

    #[test]
    fn other_languages_are_not_unwrapped() {
        let raw = "```rust\nfn main() {}\n```";
        assert_eq!(unwrap_markdown(raw), raw);
    }

    #[test]
    fn no_json_falls_back() {
        let decoded: Decoded<Topic> = decode_json("I cannot help with that.");
        assert!(matches!(decoded, Decoded::Fallback { .. }));
    }

    #[test]
    fn wrong_shape_falls_back() {
        let decoded: Decoded<Topic> = decode_json(r#"{"name": "no title"}"#);
        let title = decoded.unwrap_or_else(|_| Topic {
            title: "default".to_string(),
        });
        assert_eq!(title.title, "default");
    }
}
