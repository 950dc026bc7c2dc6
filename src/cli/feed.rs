use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use scribe::{Article, Config, Directory, feed};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Write RSS, Atom and sitemap files for the stored articles")]
pub struct Feed {
    /// Output directory, relative to the site root
    #[arg(long, default_value = "public")]
    out: PathBuf,
}

impl Feed {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);
        let store = Directory::from_config(root, &config);
        let articles: Vec<Article> = store.list().into_iter().collect();

        let out_dir = root.join(&self.out);
        let paths = feed::write_all(&out_dir, &config.site, &articles)
            .context("failed to write feeds")?;

        for path in paths {
            println!("  Wrote: {}", path.display());
        }
        println!(
            "{}",
            format!("{} article(s) published to feeds", articles.len()).success()
        );
        Ok(())
    }
}
