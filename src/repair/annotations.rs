use std::sync::LazyLock;

use regex::Regex;

/// Tags whose content is model reasoning and is removed entirely.
const REASONING_TAGS: [&str; 4] = ["think", "thinking", "reasoning", "reflection"];

static REASONING_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    REASONING_TAGS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("reasoning tag pattern is valid")
        })
        .collect()
});

static OUTPUT_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?output\s*>").expect("output tag pattern is valid"));

static LEFTOVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:think|thinking|reasoning|reflection)\b")
        .expect("leftover tag pattern is valid")
});

/// Removes reasoning blocks (tags and content) and unwraps `<output>` tags.
pub fn strip(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in REASONING_BLOCKS.iter() {
        out = pattern.replace_all(&out, "").into_owned();
    }
    OUTPUT_TAGS.replace_all(&out, "").into_owned()
}

/// Whether an opening reasoning tag survives in `text`.
#[must_use]
pub fn has_leftovers(text: &str) -> bool {
    LEFTOVER.is_match(text)
}
