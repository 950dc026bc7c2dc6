use std::{path::Path, process, time::Duration};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scribe::generate::{OpenRouterClient, Orchestrator, Outcome, RunSummary};
use tracing::instrument;

use super::terminal::{self, Colorize};

#[derive(Debug, Parser)]
#[command(about = "Generate, repair, validate and store new articles")]
pub struct Generate {
    /// Number of articles to generate (defaults to the configured articles per run)
    #[arg(long, short = 'n')]
    count: Option<usize>,

    /// OpenRouter API key
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: String,
}

impl Generate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = super::load_config(root)?;
        let count = self.count.unwrap_or(config.generation.articles_per_run);
        let models = config.generation.models();

        println!("Models:   {} in fallback chain (primary {})", models.len(), models.first());
        println!("Articles: {count}");
        println!("Quota:    {} requests per day\n", config.quota.daily_limit);

        let client = OpenRouterClient::new(
            &config.generation.base_url,
            self.api_key,
            config.site.url.clone(),
            config.generation.app_title.clone(),
        );
        let mut orchestrator =
            Orchestrator::new(client, root, &config).context("failed to open topic queue")?;

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .context("invalid progress template")?,
        );
        spinner.set_message(format!("generating {count} article(s)"));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let summary = runtime.block_on(orchestrator.run(count));
        spinner.finish_and_clear();

        print_summary(&summary);

        if !summary.all_succeeded() {
            process::exit(1);
        }
        Ok(())
    }
}

fn print_summary(summary: &RunSummary) {
    let rows: Vec<Vec<String>> = summary
        .articles
        .iter()
        .map(|article| match &article.outcome {
            Outcome::Saved(saved) => vec![
                article.index.to_string(),
                "ok".success(),
                article.category.clone(),
                saved.word_count.to_string(),
                saved.model.clone(),
                terminal::truncate(saved.slug.as_str(), 50),
            ],
            Outcome::Failed { error } => vec![
                article.index.to_string(),
                "failed".failure(),
                article.category.clone(),
                "-".to_string(),
                "-".to_string(),
                terminal::truncate(error, 50),
            ],
        })
        .collect();

    if !rows.is_empty() {
        terminal::print_table(&["#", "STATUS", "CATEGORY", "WORDS", "MODEL", "SLUG / ERROR"], &rows);
        println!();
    }

    for saved in summary.saved().filter(|saved| !saved.warnings.is_empty()) {
        println!("{} {}", "!".warning(), saved.slug);
        for warning in &saved.warnings {
            println!("    {}", warning.dim());
        }
    }

    let stored = summary.saved().count();
    let line = format!(
        "{stored}/{} stored, {} calls used, {} remaining",
        summary.articles.len(),
        summary.calls_used,
        summary.calls_remaining
    );
    if summary.all_succeeded() {
        println!("{}", line.success());
    } else {
        println!("{}", line.failure());
    }
    if summary.quota_exhausted {
        println!("{}", "Quota exhausted; remaining articles were not attempted".warning());
    }
}
