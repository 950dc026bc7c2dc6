use std::sync::LazyLock;

use regex::Regex;

static LESS_EQUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<=[ \t]*(\d)").expect("pattern is valid"));
static GREATER_EQUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">=[ \t]*(\d)").expect("pattern is valid"));
static LESS_THAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<(\d)").expect("pattern is valid"));
static GREATER_THAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">(\d)").expect("pattern is valid"));
static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{4,}").expect("pattern is valid"));

/// Rewrites stray `<` and `>` so an MDX compiler does not read them as JSX.
///
/// - ` -> ` and ` <- ` become arrows
/// - `<=N` and `>=N` become `≤N` and `≥N`
/// - `<N` and `>N` become words
/// - a bracket with horizontal whitespace on both sides becomes an entity,
///   as does a `<` that ends a line
///
/// A `>` at the start of a line is left alone so blockquotes survive.
pub fn disambiguate(text: &str) -> String {
    let text = rewrite_spaced(text);
    let text = LESS_EQUAL.replace_all(&text, "≤$1");
    let text = GREATER_EQUAL.replace_all(&text, "≥$1");
    let text = LESS_THAN.replace_all(&text, "less than $1");
    GREATER_THAN
        .replace_all(&text, "greater than $1")
        .into_owned()
}

/// Collapses runs of blank lines and strips trailing whitespace per line.
pub fn tidy_whitespace(text: &str) -> String {
    let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut out = trimmed.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    EXCESS_BLANK_LINES.replace_all(&out, "\n\n\n").into_owned()
}

/// Handles the whitespace-delimited forms: arrows and lone brackets.
///
/// Context is always taken from the input, so adjacent matches such as
/// `a -> -> b` are all rewritten in a single pass.
fn rewrite_spaced(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let spaced = |i: Option<usize>| {
        i.and_then(|i| chars.get(i))
            .is_some_and(|&c| matches!(c, ' ' | '\t'))
    };
    // A `<` closing a line still opens a tag. `>` is not extended the same
    // way so a line-start blockquote marker stays intact.
    let spaced_or_eol =
        |i: usize| spaced(Some(i)) || matches!(chars.get(i), Some('\n' | '\r'));

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let before = spaced(i.checked_sub(1));
        match (chars[i], chars.get(i + 1).copied()) {
            ('-', Some('>')) if before && spaced(Some(i + 2)) => {
                out.push('→');
                i += 2;
            }
            ('<', Some('-')) if before && spaced(Some(i + 2)) => {
                out.push('←');
                i += 2;
            }
            ('<', _) if before && spaced_or_eol(i + 1) => {
                out.push_str("&lt;");
                i += 1;
            }
            ('>', _) if before && spaced(Some(i + 1)) => {
                out.push_str("&gt;");
                i += 1;
            }
            (c, _) => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
