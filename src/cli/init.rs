use std::{fs, path::Path};

use anyhow::Context;
use clap::Parser;
use scribe::{CONFIG_FILE, Config};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Init {
    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Site already initialized (found existing {CONFIG_FILE}); use --force to overwrite"
            );
        }

        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create {}", root.display()))?;
        let config = Config::default();
        config
            .save(&config_path)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;

        let content_dir = config.content_dir(root);
        fs::create_dir_all(&content_dir)
            .with_context(|| format!("Failed to create {}", content_dir.display()))?;

        let data_dir = Config::data_dir(root);
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        println!("{}", format!("Initialized site in {}", root.display()).success());
        println!("  Created: {CONFIG_FILE}");
        println!("  Created: {}", config.content.dir.display());
        println!();
        println!("Next steps:");
        println!("  scribe topics seed");
        println!("  OPENROUTER_API_KEY=... scribe generate");

        Ok(())
    }
}
