use std::path::Path;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use scribe::{Article, Config, Directory};
use serde::Serialize;
use tracing::instrument;

use super::terminal::{self, Colorize};

const MAX_TITLE: usize = 60;

/// Command arguments for `scribe list`.
#[derive(Debug, Parser)]
pub struct List {
    /// Only articles in this category (case-insensitive).
    #[arg(long)]
    category: Option<String>,

    /// Limit number of rows returned.
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Output format (default: table).
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,

    /// Print slugs only.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Row<'a> {
    slug: &'a str,
    title: &'a str,
    date: String,
    category: &'a str,
    read_time: &'a str,
    word_count: usize,
}

impl<'a> From<&'a Article> for Row<'a> {
    fn from(article: &'a Article) -> Self {
        Self {
            slug: article.slug().as_str(),
            title: &article.meta().title,
            date: article.published().format("%Y-%m-%d").to_string(),
            category: &article.meta().category,
            read_time: &article.meta().read_time,
            word_count: article.word_count(),
        }
    }
}

impl List {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);
        let store = Directory::from_config(root, &config);

        let articles: Vec<Article> = store
            .list()
            .into_iter()
            .filter(|article| {
                self.category
                    .as_deref()
                    .is_none_or(|c| article.meta().category.eq_ignore_ascii_case(c))
            })
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();

        if self.quiet {
            for article in &articles {
                println!("{}", article.slug());
            }
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => {
                let rows: Vec<Row<'_>> = articles.iter().map(Row::from).collect();
                serde_json::to_writer_pretty(std::io::stdout(), &rows)
                    .context("failed to render json output")?;
                println!();
            }
            OutputFormat::Table => render_table(&articles),
        }
        Ok(())
    }
}

fn render_table(articles: &[Article]) {
    if articles.is_empty() {
        println!("{}", "No articles found".dim());
        return;
    }

    if terminal::is_narrow() {
        for article in articles {
            println!("{}", article.slug());
        }
        return;
    }

    let rows: Vec<Vec<String>> = articles
        .iter()
        .map(Row::from)
        .map(|row| {
            vec![
                row.date,
                row.slug.to_string(),
                row.category.to_string(),
                row.word_count.to_string(),
                terminal::truncate(row.title, MAX_TITLE),
            ]
        })
        .collect();
    terminal::print_table(&["DATE", "SLUG", "CATEGORY", "WORDS", "TITLE"], &rows);
    println!("\n{}", format!("{} article(s)", articles.len()).dim());
}
