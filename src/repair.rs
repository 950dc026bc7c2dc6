//! Best-effort sanitization of generated Markdown before it is stored.
//!
//! [`repair`] runs a fixed sequence of rewrite passes. None of them can fail:
//! a pass whose pattern does not match is a no-op. Code (fenced blocks and
//! inline spans) is swapped out before any rewriting and restored verbatim
//! at the end, and the whole pipeline is idempotent.

mod annotations;
mod brackets;
mod protect;
mod tables;

pub use annotations::{has_leftovers as has_leftover_annotations, strip as strip_annotations};
use protect::Protected;

/// Repairs generated Markdown so it renders cleanly as MDX.
///
/// Passes, in order:
/// 1. strip reasoning annotations (`<think>` and friends)
/// 2. protect code
/// 3. disambiguate angle brackets and tidy whitespace
/// 4. hoist tables out of list items
/// 5. normalize table columns and spacing
/// 6. restore code and trim
#[must_use]
pub fn repair(text: &str) -> String {
    let stripped = strip_annotations(text);
    Protected::new(&stripped)
        .map(|text| {
            let text = brackets::disambiguate(text);
            let text = brackets::tidy_whitespace(&text);
            let text = tables::hoist_from_lists(&text);
            tables::normalize(&text)
        })
        .restore()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const GENERATED: &str = r"<thinking>
Outline the comparison first.
</thinking>
<output>
## Comparing Runtimes

Latency is <10ms and throughput is >500 req/s. Memory use stays <= 64 MB.

Pipeline: request -> parser -> handler.

- Summary table
| Runtime | Latency | Notes |
|:--|--:|
| tokio | 1 ms | work stealing | extra |
| smol | 2 ms |

```rust
if a < b && c -> d { return; }
```

Use `x < y` inline. A > B matters.




> Quoted insight
</output>";

    #[test]
    fn strips_annotations_before_the_heading() {
        let repaired = repair("<think>ignore me</think>## Real Heading\nBody text");
        assert!(!repaired.contains("<think>"));
        assert!(repaired.starts_with("## Real Heading"));
    }

    #[test]
    fn rewrites_numeric_comparisons() {
        assert_eq!(
            repair("Latency is <10ms and throughput is >500 req/s."),
            "Latency is less than 10ms and throughput is greater than 500 req/s."
        );
    }

    #[test]
    fn hoists_table_from_list_item() {
        let repaired = repair("- Item one\n|A|B|\n|-|-|\n|1|2|");
        assert!(repaired.starts_with("- Item one\n\n|"));
        assert_eq!(repaired, "- Item one\n\n| A | B |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn code_is_never_rewritten() {
        let repaired = repair(GENERATED);
        assert!(repaired.contains("```rust\nif a < b && c -> d { return; }\n```"));
        assert!(repaired.contains("`x < y`"));
        assert!(repaired.contains("A &gt; B"));
    }

    #[test]
    fn full_document() {
        let repaired = repair(GENERATED);

        assert!(repaired.starts_with("## Comparing Runtimes"));
        assert!(repaired.contains("Latency is less than 10ms"));
        assert!(repaired.contains("≤64 MB"));
        assert!(repaired.contains("request → parser → handler"));
        assert!(repaired.contains(
            "- Summary table\n\n| Runtime | Latency | Notes |\n| :--- | ---: | --- |\n| tokio | 1 ms | work stealing |\n| smol | 2 ms |  |\n\n```rust"
        ));
        assert!(repaired.ends_with("> Quoted insight"));
        assert!(!repaired.contains("\n\n\n\n"));
        assert!(!repaired.contains("output>"));
    }

    #[test]
    fn every_table_row_matches_the_header() {
        let repaired = repair(GENERATED);
        let rows: Vec<_> = repaired.lines().filter(|l| l.starts_with('|')).collect();
        let cells = |row: &str| row.matches(" | ").count();
        assert!(rows.len() >= 4);
        assert!(rows.iter().all(|row| cells(row) == cells(rows[0])));
    }

    #[test_case(GENERATED; "generated document")]
    #[test_case("a < b < c -> d\n\n\n\n\ne"; "brackets and blank lines")]
    #[test_case("- item\n| a | b |\n|---|\n| 1 |"; "list table with short separator")]
    #[test_case("text `code <5` and ```\nblock >3\n``` <2"; "code with brackets")]
    #[test_case(""; "empty")]
    fn is_idempotent(input: &str) {
        let once = repair(input);
        assert_eq!(repair(&once), once);
    }
}
