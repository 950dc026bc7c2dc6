use std::{path::Path, process};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use scribe::{
    Config, Directory, Slug,
    validation::{Report, verify},
};
use serde::Serialize;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Re-read every stored article and check its structure")]
pub struct Check {
    /// Output format
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,

    /// Suppress all output except problems
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Serialize)]
struct FileResult {
    slug: String,
    issues: Vec<String>,
    warnings: Vec<String>,
}

impl FileResult {
    fn new(slug: &Slug, report: &Report) -> Self {
        Self {
            slug: slug.to_string(),
            issues: report.issues.iter().map(ToString::to_string).collect(),
            warnings: report.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);
        let store = Directory::from_config(root, &config);
        let slugs = store.slugs();

        let progress = if self.quiet || matches!(self.output, OutputFormat::Json) {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(slugs.len() as u64)
        };
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .context("invalid progress template")?,
        );

        let results: Vec<FileResult> = slugs
            .par_iter()
            .map(|slug| {
                let report = verify(&store.path_for(slug), &config.content);
                progress.inc(1);
                FileResult::new(slug, &report)
            })
            .collect();
        progress.finish_and_clear();

        let failed = results.iter().filter(|r| !r.issues.is_empty()).count();
        match self.output {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(std::io::stdout(), &results)
                    .context("failed to render json output")?;
                println!();
            }
            OutputFormat::Table => self.output_table(&results, failed),
        }

        if failed > 0 {
            process::exit(2);
        }
        Ok(())
    }

    fn output_table(&self, results: &[FileResult], failed: usize) {
        for result in results {
            if !result.issues.is_empty() {
                println!("{} {}", "✗".failure(), result.slug);
                for issue in &result.issues {
                    println!("    {issue}");
                }
            } else if !self.quiet && !result.warnings.is_empty() {
                println!("{} {}", "!".warning(), result.slug);
                for warning in &result.warnings {
                    println!("    {}", warning.dim());
                }
            }
        }

        if self.quiet {
            return;
        }
        if failed == 0 {
            println!(
                "{}",
                format!("✓ {} article(s) verified", results.len()).success()
            );
        } else {
            println!(
                "{}",
                format!("{failed} of {} article(s) failed verification", results.len()).failure()
            );
        }
    }
}
