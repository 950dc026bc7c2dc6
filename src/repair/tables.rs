use std::sync::LazyLock;

use regex::Regex;

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s").expect("list item pattern is valid"));

static SEPARATOR_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-+:?$").expect("separator cell pattern is valid"));

/// Moves tables that directly follow a list item out of the list.
///
/// The table lines are unindented and surrounded by blank lines so they
/// render as a top-level table.
pub fn hoist_from_lists(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        out.push(line);
        i += 1;

        let followed_by_table = lines.get(i).is_some_and(|next| is_table_line(next));
        if !LIST_ITEM.is_match(line) || !followed_by_table {
            continue;
        }

        out.push("");
        while let Some(next) = lines.get(i).filter(|next| is_table_line(next)) {
            out.push(next.trim());
            i += 1;
        }
        if lines.get(i).is_some_and(|next| !next.trim().is_empty()) {
            out.push("");
        }
    }

    rejoin(&out, text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InTable { columns: usize },
}

/// Rewrites every pipe table into a canonical form.
///
/// A table starts at a row directly followed by a separator row. The
/// header fixes the column count; every later row, the separator included,
/// is padded with empty cells or truncated to match. Separator cells keep
/// their alignment colons. Tables are surrounded by blank lines.
pub fn normalize(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 2);
    let mut state = State::Outside;

    for (i, line) in lines.iter().copied().enumerate() {
        state = match state {
            State::Outside => {
                let starts_table =
                    is_row(line) && lines.get(i + 1).is_some_and(|next| is_separator(next));
                if starts_table {
                    if out.last().is_some_and(|prev| !prev.trim().is_empty()) {
                        out.push(String::new());
                    }
                    let header = split_cells(line);
                    let columns = header.len();
                    out.push(format_row(header, columns));
                    State::InTable { columns }
                } else {
                    out.push(line.to_string());
                    State::Outside
                }
            }
            State::InTable { columns } => {
                if line.trim().is_empty() {
                    out.push(line.to_string());
                    State::Outside
                } else if is_separator(line) {
                    out.push(format_separator(line, columns));
                    state
                } else if is_row(line) {
                    out.push(format_row(split_cells(line), columns));
                    state
                } else {
                    out.push(String::new());
                    out.push(line.to_string());
                    State::Outside
                }
            }
        };
    }

    let out: Vec<&str> = out.iter().map(String::as_str).collect();
    rejoin(&out, text)
}

fn rejoin(lines: &[&str], original: &str) -> String {
    let mut out = lines.join("\n");
    if original.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn is_row(line: &str) -> bool {
    if is_fence(line) {
        return false;
    }
    let trimmed = line.trim();
    trimmed.starts_with('|') || pipe_positions(trimmed).len() >= 2
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.contains('|') || !trimmed.contains('-') {
        return false;
    }
    split_cells(trimmed)
        .iter()
        .all(|cell| SEPARATOR_CELL.is_match(&cell.replace(' ', "")))
}

/// Byte offsets of pipes not preceded by a backslash.
fn pipe_positions(line: &str) -> Vec<usize> {
    let mut escaped = false;
    let mut positions = Vec::new();
    for (idx, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '|' if !escaped => positions.push(idx),
            _ => escaped = false,
        }
        if c != '\\' {
            escaped = false;
        }
    }
    positions
}

/// Splits a row into trimmed cells, ignoring outer pipes and escaped pipes.
fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let pipes = pipe_positions(trimmed);

    let start = usize::from(pipes.first() == Some(&0));
    let end = if trimmed.len() > 1 && pipes.last() == Some(&(trimmed.len() - 1)) {
        trimmed.len() - 1
    } else {
        trimmed.len()
    };

    let mut cells = Vec::new();
    let mut from = start;
    for &pipe in pipes.iter().filter(|&&p| p >= start && p < end) {
        cells.push(trimmed[from..pipe].trim().to_string());
        from = pipe + 1;
    }
    cells.push(trimmed[from.min(end)..end].trim().to_string());
    cells
}

fn format_row(mut cells: Vec<String>, columns: usize) -> String {
    cells.resize(columns, String::new());
    format!("| {} |", cells.join(" | "))
}

fn format_separator(line: &str, columns: usize) -> String {
    let cells = split_cells(line)
        .into_iter()
        .map(|cell| {
            let cell = cell.replace(' ', "");
            match (cell.starts_with(':'), cell.ends_with(':') && cell.len() > 1) {
                (true, true) => ":---:".to_string(),
                (true, false) => ":---".to_string(),
                (false, true) => "---:".to_string(),
                (false, false) => "---".to_string(),
            }
        })
        .chain(std::iter::repeat_with(|| "---".to_string()))
        .take(columns)
        .collect();
    format_row(cells, columns)
}
