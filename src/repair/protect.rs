use std::sync::LazyLock;

use regex::{Captures, Regex};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("fence pattern is valid"));

static INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("inline code pattern is valid"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{OPEN}([BI])(\d+){CLOSE}")).expect("placeholder pattern is valid")
});

/// Text with its code spans swapped out for opaque placeholders.
///
/// Placeholders are delimited by private-use code points and contain no
/// characters any rewrite pass reacts to.
#[derive(Debug)]
pub struct Protected {
    text: String,
    blocks: Vec<String>,
    inline: Vec<String>,
}

impl Protected {
    /// Replaces fenced blocks, then inline spans, with placeholders.
    pub fn new(text: &str) -> Self {
        let mut blocks = Vec::new();
        let text = FENCED.replace_all(text, |caps: &Captures| {
            blocks.push(caps[0].to_string());
            format!("{OPEN}B{}{CLOSE}", blocks.len() - 1)
        });

        let mut inline = Vec::new();
        let text = INLINE.replace_all(&text, |caps: &Captures| {
            inline.push(caps[0].to_string());
            format!("{OPEN}I{}{CLOSE}", inline.len() - 1)
        });

        Self {
            text: text.into_owned(),
            blocks,
            inline,
        }
    }

    /// Rewrites the unprotected text.
    #[must_use]
    pub fn map(self, f: impl FnOnce(&str) -> String) -> Self {
        Self {
            text: f(&self.text),
            ..self
        }
    }

    /// Puts the original code back.
    pub fn restore(self) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &Captures| {
                let store = if &caps[1] == "B" {
                    &self.blocks
                } else {
                    &self.inline
                };
                caps[2]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| store.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_hidden_from_rewrites() {
        let text = "a < b and `x < y`\n```\nif a < b {}\n```\n";
        let protected = Protected::new(text);
        assert!(!protected.text.contains("x < y"));
        assert!(!protected.text.contains("if a"));

        let restored = protected.map(|t| t.replace(" < ", " LT ")).restore();

        assert_eq!(restored, "a LT b and `x < y`\n```\nif a < b {}\n```\n");
    }

    #[test]
    fn inline_backticks_inside_fences_stay_with_the_fence() {
        let text = "```md\nuse `code` here\n```";
        let protected = Protected::new(text);
        assert_eq!(protected.blocks.len(), 1);
        assert!(protected.inline.is_empty());
        assert_eq!(protected.restore(), text);
    }

    #[test]
    fn unmatched_fence_is_left_alone() {
        let text = "```\nnever closed < 3";
        assert_eq!(Protected::new(text).restore(), text);
    }
}
