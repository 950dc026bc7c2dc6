use std::{path::Path, process};

use anyhow::Context;
use clap::Parser;
use scribe::{Config, Directory, LoadError};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Display an article's metadata and body")]
pub struct Show {
    /// The article slug (a trailing extension is ignored)
    slug: String,

    /// Output format
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,

    /// Render the body to HTML
    #[arg(long)]
    html: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);
        let store = Directory::from_config(root, &config);

        let article = match store.get(&self.slug) {
            Ok(article) => article,
            Err(LoadError::NotFound) => {
                eprintln!("Article {} not found", self.slug);
                process::exit(1);
            }
            Err(e) => return Err(e).with_context(|| format!("failed to load {}", self.slug)),
        };

        let body = if self.html {
            article.render_html()
        } else {
            article.body().to_string()
        };

        match self.output {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "slug": article.slug().as_str(),
                    "metadata": article.meta(),
                    "wordCount": article.word_count(),
                    "body": body,
                });
                serde_json::to_writer_pretty(std::io::stdout(), &value)
                    .context("failed to render json output")?;
                println!();
            }
            OutputFormat::Pretty => {
                let meta = article.meta();
                println!("{} {}", meta.emoji, meta.title);
                println!("{}\n", meta.description.dim());

                println!("{}", "Metadata".dim());
                println!("  Slug:      {}", article.slug());
                println!("  Date:      {}", meta.date);
                println!("  Category:  {}", meta.category);
                println!("  Read time: {}", meta.read_time);
                println!("  Words:     {}", article.word_count());
                println!("  Path:      {}", store.path_for(article.slug()).display());

                if !meta.keywords.is_empty() {
                    println!("\n{}", "Keywords".dim());
                    for keyword in &meta.keywords {
                        println!("  • {keyword}");
                    }
                }

                if !meta.faqs.is_empty() {
                    println!("\n{}", "FAQs".dim());
                    for faq in &meta.faqs {
                        println!("  • {}", faq.question);
                    }
                }

                println!("\n{body}");
            }
        }

        Ok(())
    }
}
